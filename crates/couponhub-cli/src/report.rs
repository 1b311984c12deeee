//! Plain-text tables for CLI output.

use chrono::{DateTime, Utc};
use couponhub_core::{Coupon, DiscountType, HealthStatus, IngestionMetrics};
use couponhub_ingest::ProviderSummary;

const TITLE_WIDTH: usize = 40;

pub(crate) fn print_coupons(coupons: &[Coupon]) {
    if coupons.is_empty() {
        println!("no coupons stored; run `couponhub run` first");
        return;
    }

    println!(
        "{:<12}{:<18}{:<16}{:<12}{:<42}ID",
        "VENDOR", "CODE", "DISCOUNT", "EXPIRES", "TITLE"
    );
    for coupon in coupons {
        println!(
            "{:<12}{:<18}{:<16}{:<12}{:<42}{}",
            coupon.vendor,
            coupon.code,
            fmt_discount(coupon.discount_type, coupon.discount_value),
            fmt_date(coupon.expires_at),
            truncate(&coupon.title, TITLE_WIDTH),
            coupon.id
        );
    }
    println!("{} coupon(s)", coupons.len());
}

pub(crate) fn print_metrics(metrics: &[IngestionMetrics]) {
    println!(
        "{:<12}{:<22}{:<10}{:>7}{:>7}{:>9}{:>10}  ERROR",
        "PROVIDER", "LAST RUN", "STATUS", "FOUND", "ADDED", "UPDATED", "MS"
    );
    for m in metrics {
        println!(
            "{:<12}{:<22}{:<10}{:>7}{:>7}{:>9}{:>10}  {}",
            m.provider,
            m.last_run.format("%Y-%m-%d %H:%M:%S"),
            m.status.to_string(),
            m.coupons_found,
            m.coupons_added,
            m.coupons_updated,
            m.duration,
            m.error.as_deref().unwrap_or("")
        );
    }
}

pub(crate) fn print_health(health: &HealthStatus) {
    println!(
        "coupons: {} total, {} active; last run: {}",
        health.total_coupons,
        health.active_coupons,
        health
            .last_ingestion_run
            .map_or_else(|| "never".to_string(), |t| t.to_rfc3339())
    );
    println!(
        "{:<12}{:<10}{:>9}  {:<12}LAST FAILURE",
        "PROVIDER", "STATUS", "FAILURES", "LAST SUCCESS"
    );
    for (name, provider) in &health.providers {
        println!(
            "{:<12}{:<10}{:>9}  {:<12}{}",
            name,
            provider.status.to_string(),
            provider.consecutive_failures,
            fmt_date(provider.last_success),
            fmt_date(provider.last_failure)
        );
    }
}

pub(crate) fn print_providers(providers: &[ProviderSummary]) {
    println!("{:<12}{:<9}SCHEDULE", "PROVIDER", "ENABLED");
    for p in providers {
        println!(
            "{:<12}{:<9}{}",
            p.name,
            if p.enabled { "yes" } else { "no" },
            p.refresh_interval
        );
    }
}

fn fmt_discount(kind: DiscountType, value: Option<f64>) -> String {
    match (kind, value) {
        (DiscountType::Percentage, Some(v)) => format!("{v}% off"),
        (DiscountType::Fixed, Some(v)) => format!("${v:.2} off"),
        (DiscountType::FreeDelivery, _) => "free delivery".to_string(),
        (kind, _) => kind.to_string(),
    }
}

fn fmt_date(value: Option<DateTime<Utc>>) -> String {
    value.map_or_else(|| "-".to_string(), |d| d.format("%Y-%m-%d").to_string())
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        format!("{}...", text.chars().take(max_chars - 3).collect::<String>())
    } else {
        text.to_string()
    }
}
