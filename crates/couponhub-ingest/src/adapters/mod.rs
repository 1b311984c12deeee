//! Concrete provider adapters and construction from [`ProviderConfig`].

mod placeholder;
mod promo_page;

use std::sync::Arc;

use couponhub_core::{ProviderAdapter, ProviderConfig};

use crate::fetch::Fetcher;
use crate::provider::Provider;

pub use placeholder::PlaceholderProvider;
pub use promo_page::{extract_promotions, PromoPageProvider};

/// Builds the adapter named by `config.adapter`.
#[must_use]
pub fn build_provider(config: ProviderConfig, fetcher: &Fetcher) -> Arc<dyn Provider> {
    match config.adapter {
        ProviderAdapter::PromoPage => Arc::new(PromoPageProvider::new(config, fetcher.clone())),
        ProviderAdapter::Placeholder => Arc::new(PlaceholderProvider::new(config)),
    }
}
