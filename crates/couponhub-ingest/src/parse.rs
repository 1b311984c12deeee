//! Text heuristics for turning a scraped promo (code, title, description)
//! into a [`NormalizedCoupon`] with discount details filled in.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use couponhub_core::{DiscountType, NormalizedCoupon};
use regex::Regex;

static PERCENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*%").expect("valid percent regex"));

static DOLLAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\s*(\d+(?:\.\d+)?)").expect("valid dollar regex"));

static MIN_ORDER_AFTER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\s*(\d+(?:\.\d+)?)\s*(?:minimum|min\b|order)").expect("valid min-order regex")
});

static MIN_ORDER_BEFORE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:orders?\s+(?:over|of\s+at\s+least|above)|minimum(?:\s+order)?(?:\s+of)?)\s*\$\s*(\d+(?:\.\d+)?)")
        .expect("valid min-order prefix regex")
});

static EXPIRES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)expires?\s*:?\s*(?:on\s+)?(\d{1,2})[/-](\d{1,2})[/-](\d{2,4})")
        .expect("valid expiry regex")
});

/// Builds a raw coupon from scraped text, inferring discount type and
/// amounts from `title` and `description`.
///
/// Rules, checked in order against the lowercased title + description:
/// 1. "free delivery" or "$0 delivery" → [`DiscountType::FreeDelivery`].
/// 2. A `N%` figure or the word "percent" → [`DiscountType::Percentage`],
///    value `N` when present.
/// 3. A `$N` figure or the word "off" → [`DiscountType::Fixed`], value from
///    the first `$N`.
/// 4. Otherwise [`DiscountType::Other`].
///
/// A minimum order is read from `$N minimum` / `$N min` / `$N order` or
/// `orders over $N`; an expiry from `expires MM/DD/YYYY` in the description.
#[must_use]
pub fn parse_coupon_details(
    code: &str,
    title: &str,
    description: &str,
    vendor: &str,
) -> NormalizedCoupon {
    let combined = format!("{} {}", title.to_lowercase(), description.to_lowercase());

    let (discount_type, discount_value) =
        if combined.contains("free delivery") || combined.contains("$0 delivery") {
            (DiscountType::FreeDelivery, None)
        } else if combined.contains('%') || combined.contains("percent") {
            (DiscountType::Percentage, first_number(&PERCENT_RE, &combined))
        } else if combined.contains('$') || combined.contains("off") {
            (DiscountType::Fixed, first_number(&DOLLAR_RE, &combined))
        } else {
            (DiscountType::Other, None)
        };

    let min_order_value = first_number(&MIN_ORDER_AFTER_RE, &combined)
        .or_else(|| first_number(&MIN_ORDER_BEFORE_RE, &combined));

    NormalizedCoupon {
        code: code.trim().to_string(),
        title: title.trim().to_string(),
        description: description.trim().to_string(),
        vendor: vendor.to_string(),
        discount_type,
        discount_value,
        min_order_value,
        expires_at: parse_expiry(description),
        terms_url: None,
    }
}

/// Parses `expires MM/DD/YYYY` (or `-` separators, two-digit years) into the
/// last second of that day, UTC.
#[must_use]
pub fn parse_expiry(text: &str) -> Option<DateTime<Utc>> {
    let caps = EXPIRES_RE.captures(text)?;
    let month: u32 = caps.get(1)?.as_str().parse().ok()?;
    let day: u32 = caps.get(2)?.as_str().parse().ok()?;
    let year_raw = caps.get(3)?.as_str();
    let mut year: i32 = year_raw.parse().ok()?;
    if year_raw.len() == 2 {
        year += 2000;
    }

    NaiveDate::from_ymd_opt(year, month, day)?
        .and_hms_opt(23, 59, 59)
        .map(|dt| dt.and_utc())
}

fn first_number(re: &Regex, text: &str) -> Option<f64> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
}
