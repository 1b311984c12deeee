use async_trait::async_trait;
use couponhub_core::{ProviderConfig, ScraperResult};

use crate::error::ProviderError;
use crate::provider::Provider;

/// Registers a platform that has no scraping adapter yet. Every scrape
/// succeeds with zero coupons.
#[derive(Debug, Clone)]
pub struct PlaceholderProvider {
    config: ProviderConfig,
}

impl PlaceholderProvider {
    #[must_use]
    pub fn new(config: ProviderConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Provider for PlaceholderProvider {
    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    async fn scrape(&self) -> Result<ScraperResult, ProviderError> {
        tracing::info!(provider = %self.config.name, "placeholder provider: no adapter configured");
        Ok(ScraperResult::succeeded(Vec::new()))
    }
}
