//! Normalization from provider output ([`NormalizedCoupon`]) to stored
//! [`Coupon`] records.
//!
//! The coupon id is a SHA-256 over `vendor`, the normalized code and the
//! trimmed title. Equal inputs always produce equal ids, which is what lets
//! the store merge repeated scrapes of the same offer.

use std::collections::HashMap;

use chrono::Utc;
use couponhub_core::{Coupon, NormalizedCoupon};
use sha2::{Digest, Sha256};

/// Uppercases `code` and removes every whitespace character.
///
/// Idempotent: `normalize_code(&normalize_code(x)) == normalize_code(x)`.
#[must_use]
pub fn normalize_code(code: &str) -> String {
    code.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

/// Deterministic coupon id for a `(vendor, code, title)` triple.
#[must_use]
pub fn generate_coupon_id(vendor: &str, code: &str, title: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(vendor.as_bytes());
    hasher.update(b"\x1f");
    hasher.update(normalize_code(code).as_bytes());
    hasher.update(b"\x1f");
    hasher.update(title.trim().as_bytes());
    let digest = hasher.finalize();

    digest.iter().fold(String::with_capacity(64), |mut out, byte| {
        use std::fmt::Write;
        let _ = write!(out, "{byte:02x}");
        out
    })
}

/// Converts a raw provider coupon into a stored [`Coupon`] for `vendor`.
///
/// The provider's own `vendor` field is replaced by `vendor`, text fields are
/// trimmed, and both `scraped_at` and `last_verified` are set to now.
#[must_use]
pub fn normalize_coupon(raw: NormalizedCoupon, vendor: &str) -> Coupon {
    let code = normalize_code(&raw.code);
    let title = raw.title.trim().to_string();
    let id = generate_coupon_id(vendor, &code, &title);
    let now = Utc::now();

    Coupon {
        id,
        code,
        title,
        description: raw.description.trim().to_string(),
        vendor: vendor.to_string(),
        discount_type: raw.discount_type,
        discount_value: raw.discount_value,
        min_order_value: raw.min_order_value,
        expires_at: raw.expires_at,
        terms_url: raw.terms_url.filter(|u| !u.trim().is_empty()),
        scraped_at: now,
        last_verified: now,
    }
}

/// Collapses coupons sharing an id into one, keeping the most recently
/// verified entry. On equal `last_verified`, the later entry in `coupons`
/// wins. Output preserves the order in which each id was first seen.
#[must_use]
pub fn deduplicate_coupons(coupons: Vec<Coupon>) -> Vec<Coupon> {
    let mut index: HashMap<String, usize> = HashMap::with_capacity(coupons.len());
    let mut kept: Vec<Coupon> = Vec::with_capacity(coupons.len());

    for coupon in coupons {
        match index.get(&coupon.id) {
            Some(&slot) => {
                if coupon.last_verified >= kept[slot].last_verified {
                    kept[slot] = coupon;
                }
            }
            None => {
                index.insert(coupon.id.clone(), kept.len());
                kept.push(coupon);
            }
        }
    }

    kept
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
