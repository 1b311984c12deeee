use chrono::{Duration, Utc};
use couponhub_core::DiscountType;

use super::*;

fn raw_coupon(code: &str, title: &str, description: &str) -> NormalizedCoupon {
    NormalizedCoupon {
        code: code.to_owned(),
        title: title.to_owned(),
        description: description.to_owned(),
        vendor: "whatever-the-page-said".to_owned(),
        discount_type: DiscountType::Percentage,
        discount_value: Some(20.0),
        min_order_value: Some(15.0),
        expires_at: None,
        terms_url: Some("https://example.com/terms".to_owned()),
    }
}

// -----------------------------------------------------------------------
// normalize_code
// -----------------------------------------------------------------------

#[test]
fn normalize_code_uppercases_and_strips_whitespace() {
    assert_eq!(normalize_code(" save 20\tnow\n"), "SAVE20NOW");
}

#[test]
fn normalize_code_is_idempotent() {
    for input in ["eats50", "  Free Delivery ", "ÄBC 12", "", "ALREADY"] {
        let once = normalize_code(input);
        assert_eq!(normalize_code(&once), once, "not idempotent for {input:?}");
    }
}

// -----------------------------------------------------------------------
// generate_coupon_id
// -----------------------------------------------------------------------

#[test]
fn coupon_id_is_deterministic() {
    let a = generate_coupon_id("UberEats", "SAVE20", "20% off");
    let b = generate_coupon_id("UberEats", "SAVE20", "20% off");
    assert_eq!(a, b);
    assert_eq!(a.len(), 64);
    assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn coupon_id_ignores_code_formatting() {
    let a = generate_coupon_id("UberEats", "save 20", "20% off");
    let b = generate_coupon_id("UberEats", "SAVE20", "20% off");
    assert_eq!(a, b);
}

#[test]
fn coupon_id_differs_by_vendor_and_title() {
    let base = generate_coupon_id("UberEats", "SAVE20", "20% off");
    assert_ne!(base, generate_coupon_id("DoorDash", "SAVE20", "20% off"));
    assert_ne!(base, generate_coupon_id("UberEats", "SAVE20", "20% off pickup"));
}

#[test]
fn coupon_id_fields_do_not_bleed_into_each_other() {
    // Without a separator these would hash the same byte string.
    let a = generate_coupon_id("Uber", "EATS1", "x");
    let b = generate_coupon_id("UberE", "ATS1", "x");
    assert_ne!(a, b);
}

// -----------------------------------------------------------------------
// normalize_coupon
// -----------------------------------------------------------------------

#[test]
fn normalize_coupon_tags_vendor_and_trims() {
    let coupon = normalize_coupon(
        raw_coupon(" save20 ", "  20% off  ", "  Valid on orders over $15 "),
        "UberEats",
    );
    assert_eq!(coupon.vendor, "UberEats");
    assert_eq!(coupon.code, "SAVE20");
    assert_eq!(coupon.title, "20% off");
    assert_eq!(coupon.description, "Valid on orders over $15");
    assert_eq!(coupon.id, generate_coupon_id("UberEats", "SAVE20", "20% off"));
    assert_eq!(coupon.scraped_at, coupon.last_verified);
}

#[test]
fn normalize_coupon_keeps_discount_fields() {
    let coupon = normalize_coupon(raw_coupon("A1", "t", "d"), "UberEats");
    assert_eq!(coupon.discount_type, DiscountType::Percentage);
    assert_eq!(coupon.discount_value, Some(20.0));
    assert_eq!(coupon.min_order_value, Some(15.0));
    assert_eq!(coupon.terms_url.as_deref(), Some("https://example.com/terms"));
}

#[test]
fn normalize_coupon_drops_blank_terms_url() {
    let mut raw = raw_coupon("A1", "t", "d");
    raw.terms_url = Some("   ".to_owned());
    assert!(normalize_coupon(raw, "UberEats").terms_url.is_none());
}

// -----------------------------------------------------------------------
// deduplicate_coupons
// -----------------------------------------------------------------------

#[test]
fn deduplicate_keeps_most_recently_verified() {
    let older = normalize_coupon(raw_coupon("A1", "t", "old"), "UberEats");
    let mut newer = older.clone();
    newer.description = "new".to_owned();
    newer.last_verified = older.last_verified + Duration::minutes(5);

    let result = deduplicate_coupons(vec![newer.clone(), older.clone()]);
    assert_eq!(result, vec![newer.clone()]);

    let result = deduplicate_coupons(vec![older, newer.clone()]);
    assert_eq!(result, vec![newer]);
}

#[test]
fn deduplicate_tie_goes_to_last_seen() {
    let first = normalize_coupon(raw_coupon("A1", "t", "first"), "UberEats");
    let mut second = first.clone();
    second.description = "second".to_owned();

    let result = deduplicate_coupons(vec![first, second]);
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].description, "second");
}

#[test]
fn deduplicate_preserves_distinct_ids_in_first_seen_order() {
    let now = Utc::now();
    let mut a = normalize_coupon(raw_coupon("A1", "a", "d"), "UberEats");
    let mut b = normalize_coupon(raw_coupon("B2", "b", "d"), "UberEats");
    a.last_verified = now;
    b.last_verified = now;
    let result = deduplicate_coupons(vec![a.clone(), b.clone(), a.clone()]);
    let ids: Vec<_> = result.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec![a.id.as_str(), b.id.as_str()]);
}
