use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    Percentage,
    Fixed,
    FreeDelivery,
    Other,
}

impl std::fmt::Display for DiscountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscountType::Percentage => write!(f, "percentage"),
            DiscountType::Fixed => write!(f, "fixed"),
            DiscountType::FreeDelivery => write!(f, "free_delivery"),
            DiscountType::Other => write!(f, "other"),
        }
    }
}

/// A coupon candidate as returned by a provider, before it has an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedCoupon {
    pub code: String,
    pub title: String,
    pub description: String,
    /// Overwritten with the provider name during normalization.
    pub vendor: String,
    pub discount_type: DiscountType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_order_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terms_url: Option<String>,
}

/// A stored coupon.
///
/// `id` is a content hash of `(vendor, normalized code, title)`, so the same
/// logical offer scraped on different runs always lands on the same record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub id: String,
    pub code: String,
    pub title: String,
    pub description: String,
    pub vendor: String,
    pub discount_type: DiscountType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_order_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terms_url: Option<String>,
    /// First time this coupon was seen. Never changed by later merges.
    pub scraped_at: DateTime<Utc>,
    pub last_verified: DateTime<Utc>,
}

impl Coupon {
    /// A coupon is active when it has no expiry or expires after `now`.
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|expires| expires > now)
    }
}

/// Outcome envelope of a single provider invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScraperResult {
    pub success: bool,
    pub coupons: Vec<NormalizedCoupon>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ScraperResult {
    #[must_use]
    pub fn succeeded(coupons: Vec<NormalizedCoupon>) -> Self {
        Self {
            success: true,
            coupons,
            error: None,
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            coupons: Vec::new(),
            error: Some(error.into()),
            timestamp: Utc::now(),
        }
    }
}
