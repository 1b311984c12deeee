//! Facade over the store, metrics, registry and scheduler.
//!
//! The service is built once in the binary's composition root and shared as
//! an `Arc<IngestionService>`. Its lifecycle is
//! `uninitialized → initialized → shut down`; the scheduler may be started
//! and stopped any number of times while initialized.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use couponhub_core::{AppConfig, Coupon, HealthStatus, IngestionMetrics, ProviderConfig};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::adapters::build_provider;
use crate::error::IngestError;
use crate::fetch::Fetcher;
use crate::metrics::MetricsTracker;
use crate::provider::ManagedProvider;
use crate::registry::ProviderRegistry;
use crate::scheduler::{IngestionScheduler, SchedulerStatus};
use crate::store::CouponStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSummary {
    pub name: String,
    pub enabled: bool,
    pub refresh_interval: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Uninitialized,
    Initialized,
    ShutDown,
}

#[derive(Debug)]
pub struct IngestionService {
    registry: Arc<ProviderRegistry>,
    store: Arc<CouponStore>,
    metrics: Arc<MetricsTracker>,
    scheduler: IngestionScheduler,
    lifecycle: Mutex<Lifecycle>,
    shutdown_timeout: Duration,
}

impl IngestionService {
    /// Every registered provider is announced to the metrics tracker so it
    /// shows up in health reports before its first run.
    #[must_use]
    pub fn new(
        store_path: impl Into<PathBuf>,
        metrics_history: usize,
        registry: ProviderRegistry,
        shutdown_timeout: Duration,
    ) -> Self {
        let registry = Arc::new(registry);
        let store = Arc::new(CouponStore::new(store_path));
        let metrics = Arc::new(MetricsTracker::new(metrics_history));
        for name in registry.names() {
            metrics.register_provider(&name);
        }
        let scheduler =
            IngestionScheduler::new(Arc::clone(&registry), Arc::clone(&store), Arc::clone(&metrics));

        Self {
            registry,
            store,
            metrics,
            scheduler,
            lifecycle: Mutex::new(Lifecycle::Uninitialized),
            shutdown_timeout,
        }
    }

    /// Builds the adapters for `providers` over one shared [`Fetcher`] and
    /// wires the service from `config`.
    ///
    /// # Errors
    ///
    /// - [`IngestError::HttpClient`] if the HTTP client cannot be built.
    /// - [`IngestError::DuplicateProvider`] if two configs share a name.
    pub fn from_app_config(
        config: &AppConfig,
        providers: Vec<ProviderConfig>,
    ) -> Result<Self, IngestError> {
        let fetcher = Fetcher::new(
            config.fetch_timeout_secs,
            &config.fetch_user_agent,
            config.fetch_max_retries,
            config.fetch_backoff_base_secs,
        )?;

        let mut registry = ProviderRegistry::new();
        for provider_config in providers {
            let adapter = build_provider(provider_config, &fetcher);
            registry.register(Arc::new(ManagedProvider::new(adapter)))?;
        }

        Ok(Self::new(
            config.store_path.clone(),
            config.metrics_history,
            registry,
            Duration::from_secs(config.shutdown_timeout_secs),
        ))
    }

    /// Loads the coupon store. A second call only logs a warning.
    ///
    /// # Errors
    ///
    /// - [`IngestError::Persistence`] / [`IngestError::CorruptStore`] if the
    ///   store cannot be loaded. The service stays uninitialized.
    /// - [`IngestError::ShutDown`] after [`IngestionService::shutdown`].
    pub async fn initialize(&self) -> Result<(), IngestError> {
        let mut lifecycle = self.lifecycle.lock().await;
        match *lifecycle {
            Lifecycle::Initialized => {
                tracing::warn!("ingestion: already initialized");
                Ok(())
            }
            Lifecycle::ShutDown => Err(IngestError::ShutDown),
            Lifecycle::Uninitialized => {
                let loaded = self.store.initialize().await?;
                *lifecycle = Lifecycle::Initialized;
                tracing::info!(
                    providers = self.registry.len(),
                    enabled = self.registry.enabled().len(),
                    coupons = loaded,
                    "ingestion: initialized"
                );
                Ok(())
            }
        }
    }

    /// # Errors
    ///
    /// [`IngestError::NotInitialized`] before `initialize()`, otherwise any
    /// error from [`IngestionScheduler::start`].
    pub async fn start_scheduler(&self) -> Result<(), IngestError> {
        self.ensure_initialized().await?;
        self.scheduler.start().await
    }

    /// # Errors
    ///
    /// Returns [`IngestError::Scheduler`] if the job scheduler fails to shut
    /// down.
    pub async fn stop_scheduler(&self) -> Result<(), IngestError> {
        self.scheduler.stop().await
    }

    /// Runs ingestion immediately for one provider, or for every enabled
    /// provider (sequentially) when `provider` is `None`.
    ///
    /// # Errors
    ///
    /// - [`IngestError::NotInitialized`] before `initialize()`.
    /// - [`IngestError::UnknownProvider`] if `provider` is not registered.
    pub async fn run_ingestion_now(
        &self,
        provider: Option<&str>,
    ) -> Result<Vec<IngestionMetrics>, IngestError> {
        self.ensure_initialized().await?;
        match provider {
            Some(name) => {
                let target = self
                    .registry
                    .get(name)
                    .ok_or_else(|| IngestError::UnknownProvider(name.to_string()))?;
                Ok(vec![self.scheduler.run_ingestion(&target).await])
            }
            None => Ok(self.scheduler.run_all_immediately().await),
        }
    }

    #[must_use]
    pub fn has_provider(&self, name: &str) -> bool {
        self.registry.get(name).is_some()
    }

    #[must_use]
    pub fn providers(&self) -> Vec<ProviderSummary> {
        self.registry
            .all()
            .iter()
            .map(|p| ProviderSummary {
                name: p.name().to_string(),
                enabled: p.is_enabled(),
                refresh_interval: p.refresh_interval().to_string(),
            })
            .collect()
    }

    pub async fn coupons(&self) -> Vec<Coupon> {
        self.store.all().await
    }

    pub async fn coupons_by_vendor(&self, vendor: &str) -> Vec<Coupon> {
        self.store.by_vendor(vendor).await
    }

    pub async fn active_coupons(&self) -> Vec<Coupon> {
        self.store.active().await
    }

    pub async fn coupon(&self, id: &str) -> Option<Coupon> {
        self.store.by_id(id).await
    }

    /// # Errors
    ///
    /// [`IngestError::NotInitialized`] before `initialize()`, or
    /// [`IngestError::Persistence`] if the rewrite fails.
    pub async fn delete_coupon(&self, id: &str) -> Result<bool, IngestError> {
        self.ensure_initialized().await?;
        self.store.delete(id).await
    }

    /// # Errors
    ///
    /// [`IngestError::NotInitialized`] before `initialize()`, or
    /// [`IngestError::Persistence`] if the rewrite fails.
    pub async fn clear_coupons(&self) -> Result<(), IngestError> {
        self.ensure_initialized().await?;
        self.store.clear().await
    }

    pub async fn health_status(&self) -> HealthStatus {
        let total = self.store.total_count().await;
        let active = self.store.active_count().await;
        self.metrics.health_status(total, active)
    }

    #[must_use]
    pub fn metrics(&self, provider: &str, limit: usize) -> Vec<IngestionMetrics> {
        self.metrics.metrics(provider, limit)
    }

    #[must_use]
    pub fn all_metrics(&self) -> BTreeMap<String, Vec<IngestionMetrics>> {
        self.metrics.all_metrics()
    }

    pub async fn scheduler_status(&self) -> SchedulerStatus {
        self.scheduler.status().await
    }

    /// Stops the scheduler and flushes the store, bounded by the configured
    /// shutdown timeout. Later calls are no-ops.
    ///
    /// # Errors
    ///
    /// - [`IngestError::ShutdownTimedOut`] if the timeout elapses.
    /// - Any error from stopping the scheduler or flushing the store.
    ///
    /// The service is marked shut down in every case.
    pub async fn shutdown(&self) -> Result<(), IngestError> {
        let mut lifecycle = self.lifecycle.lock().await;
        let previous = *lifecycle;
        if previous == Lifecycle::ShutDown {
            tracing::warn!("ingestion: already shut down");
            return Ok(());
        }
        *lifecycle = Lifecycle::ShutDown;
        drop(lifecycle);

        tracing::info!("ingestion: shutting down");
        let flush = async {
            // An uninitialized store holds nothing loaded; flushing it would
            // overwrite the file with an empty array.
            if previous == Lifecycle::Initialized {
                self.store.flush().await
            } else {
                Ok(())
            }
        };
        let work = stop_then_flush(self.scheduler.stop(), flush);

        match tokio::time::timeout(self.shutdown_timeout, work).await {
            Ok(result) => {
                result?;
                tracing::info!("ingestion: shutdown complete");
                Ok(())
            }
            Err(_) => Err(IngestError::ShutdownTimedOut {
                timeout_secs: self.shutdown_timeout.as_secs(),
            }),
        }
    }

    async fn ensure_initialized(&self) -> Result<(), IngestError> {
        match *self.lifecycle.lock().await {
            Lifecycle::Initialized => Ok(()),
            Lifecycle::Uninitialized => Err(IngestError::NotInitialized),
            Lifecycle::ShutDown => Err(IngestError::ShutDown),
        }
    }
}

/// Awaits `stop`, then `flush` even if stopping failed. Returns the first
/// error.
async fn stop_then_flush<S, F>(stop: S, flush: F) -> Result<(), IngestError>
where
    S: Future<Output = Result<(), IngestError>>,
    F: Future<Output = Result<(), IngestError>>,
{
    let stopped = stop.await;
    if let Err(e) = &stopped {
        tracing::error!(error = %e, "ingestion: scheduler stop failed, flushing store anyway");
    }
    let flushed = flush.await;
    stopped.and(flushed)
}

#[cfg(test)]
#[path = "service_test.rs"]
mod tests;
