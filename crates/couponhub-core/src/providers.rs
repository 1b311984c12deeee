use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Cron expression used when a provider does not set `refresh_interval`.
pub const DEFAULT_REFRESH_INTERVAL: &str = "0 */6 * * *";

const DEFAULT_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderAdapter {
    /// Fetches the configured promotion pages and extracts codes from text.
    PromoPage,
    /// Always succeeds with no coupons; for platforms without an adapter yet.
    Placeholder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub max_requests: usize,
    pub per_milliseconds: u64,
}

/// Immutable settings for one coupon source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    #[serde(default)]
    pub enabled: bool,
    /// Standard 5-field cron expression.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: String,
    pub rate_limit: RateLimitConfig,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Present a desktop-browser user agent instead of the service UA.
    #[serde(default)]
    pub use_browser: bool,
    pub adapter: ProviderAdapter,
    #[serde(default)]
    pub promo_urls: Vec<String>,
}

fn default_refresh_interval() -> String {
    DEFAULT_REFRESH_INTERVAL.to_string()
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

#[derive(Debug, Deserialize)]
pub struct ProvidersFile {
    pub providers: Vec<ProviderConfig>,
}

/// Load and validate provider definitions from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_providers(path: &Path) -> Result<ProvidersFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ProvidersFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let providers_file: ProvidersFile = serde_yaml::from_str(&content)?;

    validate_providers(&providers_file.providers)?;

    Ok(providers_file)
}

/// Built-in definitions for the three delivery platforms.
///
/// UberEats is the only platform with a working adapter and is enabled by
/// default; DoorDash and GrubHub are registered but disabled.
#[must_use]
pub fn default_providers() -> Vec<ProviderConfig> {
    vec![
        ProviderConfig {
            name: "UberEats".to_string(),
            enabled: true,
            refresh_interval: "0 */4 * * *".to_string(),
            rate_limit: RateLimitConfig {
                max_requests: 15,
                per_milliseconds: 60_000,
            },
            timeout_ms: DEFAULT_TIMEOUT_MS,
            use_browser: false,
            adapter: ProviderAdapter::PromoPage,
            promo_urls: vec![
                "https://www.ubereats.com/promotions".to_string(),
                "https://www.retailmenot.com/view/ubereats.com".to_string(),
            ],
        },
        ProviderConfig {
            name: "DoorDash".to_string(),
            enabled: false,
            refresh_interval: DEFAULT_REFRESH_INTERVAL.to_string(),
            rate_limit: RateLimitConfig {
                max_requests: 10,
                per_milliseconds: 60_000,
            },
            timeout_ms: DEFAULT_TIMEOUT_MS,
            use_browser: true,
            adapter: ProviderAdapter::Placeholder,
            promo_urls: vec![],
        },
        ProviderConfig {
            name: "GrubHub".to_string(),
            enabled: false,
            refresh_interval: DEFAULT_REFRESH_INTERVAL.to_string(),
            rate_limit: RateLimitConfig {
                max_requests: 10,
                per_milliseconds: 60_000,
            },
            timeout_ms: DEFAULT_TIMEOUT_MS,
            use_browser: false,
            adapter: ProviderAdapter::Placeholder,
            promo_urls: vec![],
        },
    ]
}

/// Validate a set of provider definitions.
///
/// # Errors
///
/// Returns [`ConfigError::Validation`] describing the first problem found.
pub fn validate_providers(providers: &[ProviderConfig]) -> Result<(), ConfigError> {
    let mut seen_names = HashSet::new();

    for provider in providers {
        if provider.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "provider name must be non-empty".to_string(),
            ));
        }

        if !seen_names.insert(provider.name.to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate provider name: '{}'",
                provider.name
            )));
        }

        if provider.rate_limit.max_requests == 0 || provider.rate_limit.per_milliseconds == 0 {
            return Err(ConfigError::Validation(format!(
                "provider '{}' has an empty rate limit; max_requests and per_milliseconds must be positive",
                provider.name
            )));
        }

        let fields = provider.refresh_interval.split_whitespace().count();
        if !provider.refresh_interval.trim().is_empty() && !(5..=6).contains(&fields) {
            return Err(ConfigError::Validation(format!(
                "provider '{}' has invalid refresh_interval \"{}\"; expected a 5-field cron expression",
                provider.name, provider.refresh_interval
            )));
        }

        if provider.adapter == ProviderAdapter::PromoPage && provider.promo_urls.is_empty() {
            return Err(ConfigError::Validation(format!(
                "provider '{}' uses the promo_page adapter but lists no promo_urls",
                provider.name
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "providers_test.rs"]
mod tests;
