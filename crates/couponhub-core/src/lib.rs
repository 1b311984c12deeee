pub mod app_config;
pub mod config;
pub mod coupons;
pub mod health;
pub mod providers;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use coupons::{Coupon, DiscountType, NormalizedCoupon, ScraperResult};
pub use health::{HealthState, HealthStatus, IngestionMetrics, ProviderHealth, RunStatus};
pub use providers::{
    default_providers, load_providers, ProviderAdapter, ProviderConfig, ProvidersFile,
    RateLimitConfig, DEFAULT_REFRESH_INTERVAL,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read providers file {path}: {source}")]
    ProvidersFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse providers file: {0}")]
    ProvidersFileParse(#[from] serde_yaml::Error),

    #[error("provider config validation failed: {0}")]
    Validation(String),
}
