pub mod adapters;
pub mod error;
pub mod fetch;
pub mod metrics;
pub mod normalize;
pub mod parse;
pub mod provider;
pub mod rate_limit;
pub mod registry;
pub mod scheduler;
pub mod service;
pub mod store;

#[cfg(test)]
mod test_support;

pub use adapters::{build_provider, extract_promotions, PlaceholderProvider, PromoPageProvider};
pub use error::{FetchError, IngestError, ProviderError};
pub use fetch::{FetchOptions, FetchResult, Fetcher};
pub use metrics::MetricsTracker;
pub use normalize::{deduplicate_coupons, generate_coupon_id, normalize_code, normalize_coupon};
pub use parse::{parse_coupon_details, parse_expiry};
pub use provider::{ManagedProvider, Provider, DISABLED_MESSAGE};
pub use rate_limit::RateLimiter;
pub use registry::ProviderRegistry;
pub use scheduler::{to_job_schedule, IngestionScheduler, SchedulerStatus};
pub use service::{IngestionService, ProviderSummary};
pub use store::{CouponStore, SaveOutcome};
