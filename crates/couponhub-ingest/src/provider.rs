//! Provider contract and the shared execution wrapper around it.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use couponhub_core::{ProviderConfig, ScraperResult};
use futures::FutureExt;
use tokio::sync::{Mutex, MutexGuard};

use crate::error::ProviderError;
use crate::rate_limit::RateLimiter;

/// Message carried by the result of executing a disabled provider.
pub const DISABLED_MESSAGE: &str = "Provider is disabled";

/// A single external coupon source.
///
/// Adapters hold their own [`ProviderConfig`] and implement [`Provider::scrape`];
/// everything else (enable checks, rate limiting, error capture) lives in
/// [`ManagedProvider`].
#[async_trait]
pub trait Provider: Send + Sync {
    fn config(&self) -> &ProviderConfig;

    /// Fetches the source's current coupons.
    async fn scrape(&self) -> Result<ScraperResult, ProviderError>;

    fn name(&self) -> &str {
        &self.config().name
    }

    fn is_enabled(&self) -> bool {
        self.config().enabled
    }

    fn refresh_interval(&self) -> &str {
        &self.config().refresh_interval
    }
}

/// A registered provider: the adapter, its rate limiter, and a run guard
/// that keeps at most one ingestion run in flight per provider.
pub struct ManagedProvider {
    inner: Arc<dyn Provider>,
    limiter: RateLimiter,
    run_guard: Mutex<()>,
}

impl std::fmt::Debug for ManagedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedProvider")
            .field("name", &self.name())
            .field("enabled", &self.is_enabled())
            .field("refresh_interval", &self.refresh_interval())
            .finish_non_exhaustive()
    }
}

impl ManagedProvider {
    /// Wraps `inner` with a limiter sized from its `rate_limit` config.
    #[must_use]
    pub fn new(inner: Arc<dyn Provider>) -> Self {
        let rate = inner.config().rate_limit;
        let limiter = RateLimiter::new(
            rate.max_requests,
            Duration::from_millis(rate.per_milliseconds),
        );
        Self {
            inner,
            limiter,
            run_guard: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.inner.is_enabled()
    }

    #[must_use]
    pub fn refresh_interval(&self) -> &str {
        self.inner.refresh_interval()
    }

    #[must_use]
    pub fn config(&self) -> &ProviderConfig {
        self.inner.config()
    }

    #[must_use]
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Runs one scrape and never fails.
    ///
    /// A disabled provider returns an unsuccessful result with
    /// [`DISABLED_MESSAGE`] without touching the rate limiter. Otherwise the
    /// limiter is acquired (which may suspend), `scrape()` is invoked, and
    /// any error or panic it raises becomes an unsuccessful result.
    pub async fn execute(&self) -> ScraperResult {
        let name = self.name();

        if !self.is_enabled() {
            tracing::info!(provider = %name, "provider is disabled, skipping");
            return ScraperResult::failed(DISABLED_MESSAGE);
        }

        tracing::info!(provider = %name, "starting scrape");
        self.limiter.check_limit().await;

        match AssertUnwindSafe(self.inner.scrape()).catch_unwind().await {
            Ok(Ok(result)) => {
                if result.success {
                    tracing::info!(
                        provider = %name,
                        coupons = result.coupons.len(),
                        "scrape succeeded"
                    );
                } else {
                    tracing::error!(
                        provider = %name,
                        error = result.error.as_deref().unwrap_or("unknown error"),
                        "scrape reported failure"
                    );
                }
                result
            }
            Ok(Err(e)) => {
                tracing::error!(provider = %name, error = %e, "scrape failed");
                ScraperResult::failed(e.to_string())
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::error!(provider = %name, error = %message, "scrape panicked");
                ScraperResult::failed(message)
            }
        }
    }

    /// Serializes ingestion runs for this provider.
    pub(crate) async fn lock_run(&self) -> MutexGuard<'_, ()> {
        self.run_guard.lock().await
    }
}

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panic: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panic: {s}")
    } else {
        "panic: unknown payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use couponhub_core::{DiscountType, NormalizedCoupon, ProviderAdapter, RateLimitConfig};

    use super::*;

    fn test_config(name: &str, enabled: bool) -> ProviderConfig {
        ProviderConfig {
            name: name.to_string(),
            enabled,
            refresh_interval: "*/5 * * * *".to_string(),
            rate_limit: RateLimitConfig {
                max_requests: 2,
                per_milliseconds: 1_000,
            },
            timeout_ms: 1_000,
            use_browser: false,
            adapter: ProviderAdapter::Placeholder,
            promo_urls: vec![],
        }
    }

    enum Behaviour {
        Succeed,
        Fail,
        Panic,
    }

    struct ScriptedProvider {
        config: ProviderConfig,
        behaviour: Behaviour,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn config(&self) -> &ProviderConfig {
            &self.config
        }

        async fn scrape(&self) -> Result<ScraperResult, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behaviour {
                Behaviour::Succeed => Ok(ScraperResult::succeeded(vec![NormalizedCoupon {
                    code: "EATS5".to_string(),
                    title: "$5 off".to_string(),
                    description: "Five dollars".to_string(),
                    vendor: self.config.name.clone(),
                    discount_type: DiscountType::Fixed,
                    discount_value: Some(5.0),
                    min_order_value: None,
                    expires_at: None,
                    terms_url: None,
                }])),
                Behaviour::Fail => Err(ProviderError::Scrape("connection reset".to_string())),
                Behaviour::Panic => panic!("selector exploded"),
            }
        }
    }

    fn managed(enabled: bool, behaviour: Behaviour) -> (ManagedProvider, Arc<ScriptedProvider>) {
        let inner = Arc::new(ScriptedProvider {
            config: test_config("Scripted", enabled),
            behaviour,
            calls: AtomicUsize::new(0),
        });
        (ManagedProvider::new(inner.clone()), inner)
    }

    #[tokio::test]
    async fn disabled_provider_short_circuits_without_rate_limiting() {
        let (provider, inner) = managed(false, Behaviour::Succeed);
        let result = provider.execute().await;
        assert!(!result.success);
        assert!(result.coupons.is_empty());
        assert_eq!(result.error.as_deref(), Some(DISABLED_MESSAGE));
        assert_eq!(provider.rate_limiter().in_window().await, 0);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn enabled_provider_records_admission_and_returns_coupons() {
        let (provider, inner) = managed(true, Behaviour::Succeed);
        let result = provider.execute().await;
        assert!(result.success);
        assert_eq!(result.coupons.len(), 1);
        assert_eq!(provider.rate_limiter().in_window().await, 1);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn scrape_error_becomes_failed_result() {
        let (provider, _) = managed(true, Behaviour::Fail);
        let result = provider.execute().await;
        assert!(!result.success);
        assert!(result.coupons.is_empty());
        assert_eq!(result.error.as_deref(), Some("connection reset"));
    }

    #[tokio::test]
    async fn scrape_panic_becomes_failed_result() {
        let (provider, _) = managed(true, Behaviour::Panic);
        let result = provider.execute().await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("panic: selector exploded"));
    }

    #[test]
    fn accessors_come_from_config() {
        let (provider, _) = managed(true, Behaviour::Succeed);
        assert_eq!(provider.name(), "Scripted");
        assert!(provider.is_enabled());
        assert_eq!(provider.refresh_interval(), "*/5 * * * *");
        assert_eq!(provider.rate_limiter().max_requests(), 2);
    }
}
