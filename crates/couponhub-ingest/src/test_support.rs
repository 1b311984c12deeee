//! Scripted providers shared by the scheduler and service unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use couponhub_core::{
    DiscountType, NormalizedCoupon, ProviderAdapter, ProviderConfig, RateLimitConfig,
    ScraperResult,
};

use crate::error::ProviderError;
use crate::provider::{ManagedProvider, Provider};

#[derive(Debug, Clone)]
pub(crate) enum Outcome {
    Coupons(Vec<NormalizedCoupon>),
    Fail(String),
    Panic(String),
}

/// Plays back `Outcome`s in order; once exhausted, repeats the last one.
pub(crate) struct FakeProvider {
    config: ProviderConfig,
    script: Mutex<VecDeque<Outcome>>,
    last: Mutex<Outcome>,
    calls: AtomicUsize,
}

impl FakeProvider {
    pub(crate) fn new(name: &str, enabled: bool, script: Vec<Outcome>) -> Self {
        Self::with_config(config(name, enabled), script)
    }

    pub(crate) fn with_config(config: ProviderConfig, script: Vec<Outcome>) -> Self {
        Self {
            config,
            script: Mutex::new(script.into()),
            last: Mutex::new(Outcome::Coupons(Vec::new())),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_outcome(&self) -> Outcome {
        let mut script = self.script.lock().unwrap();
        let mut last = self.last.lock().unwrap();
        if let Some(next) = script.pop_front() {
            *last = next;
        }
        last.clone()
    }
}

#[async_trait]
impl Provider for FakeProvider {
    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    async fn scrape(&self) -> Result<ScraperResult, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.next_outcome() {
            Outcome::Coupons(coupons) => Ok(ScraperResult::succeeded(coupons)),
            Outcome::Fail(message) => Err(ProviderError::Scrape(message)),
            Outcome::Panic(message) => panic!("{message}"),
        }
    }
}

pub(crate) fn config(name: &str, enabled: bool) -> ProviderConfig {
    ProviderConfig {
        name: name.to_string(),
        enabled,
        refresh_interval: "*/5 * * * *".to_string(),
        rate_limit: RateLimitConfig {
            max_requests: 100,
            per_milliseconds: 1_000,
        },
        timeout_ms: 1_000,
        use_browser: false,
        adapter: ProviderAdapter::Placeholder,
        promo_urls: vec![],
    }
}

pub(crate) fn raw(code: &str, title: &str, description: &str) -> NormalizedCoupon {
    NormalizedCoupon {
        code: code.to_string(),
        title: title.to_string(),
        description: description.to_string(),
        vendor: "scraped-vendor".to_string(),
        discount_type: DiscountType::Fixed,
        discount_value: Some(5.0),
        min_order_value: None,
        expires_at: None,
        terms_url: None,
    }
}

pub(crate) fn managed(provider: &Arc<FakeProvider>) -> Arc<ManagedProvider> {
    Arc::new(ManagedProvider::new(Arc::clone(provider) as Arc<dyn Provider>))
}
