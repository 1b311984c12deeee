//! Cron-driven ingestion: one recurring job per enabled provider, each fire
//! running the scrape → normalize → save → metric pipeline.

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use couponhub_core::{IngestionMetrics, RunStatus, DEFAULT_REFRESH_INTERVAL};
use futures::FutureExt;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

use crate::error::IngestError;
use crate::metrics::MetricsTracker;
use crate::normalize::normalize_coupon;
use crate::provider::{panic_message, ManagedProvider};
use crate::registry::ProviderRegistry;
use crate::store::{CouponStore, SaveOutcome};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStatus {
    pub running: bool,
    pub active_tasks: usize,
    /// Names of providers with a registered recurring job.
    pub providers: Vec<String>,
}

/// Converts a 5-field cron expression into the seconds-first form the job
/// scheduler expects. Six- and seven-field expressions pass through; an
/// empty expression falls back to [`DEFAULT_REFRESH_INTERVAL`].
///
/// Returns `None` for any other field count. Field values are checked when
/// the job is built in [`IngestionScheduler::start`].
#[must_use]
pub fn to_job_schedule(expression: &str) -> Option<String> {
    let expression = match expression.trim() {
        "" => DEFAULT_REFRESH_INTERVAL,
        trimmed => trimmed,
    };
    match expression.split_whitespace().count() {
        5 => Some(format!("0 {expression}")),
        6 | 7 => Some(expression.to_string()),
        _ => None,
    }
}

/// The per-run pipeline, cheap to clone into each cron job.
#[derive(Debug, Clone)]
struct Pipeline {
    store: Arc<CouponStore>,
    metrics: Arc<MetricsTracker>,
}

impl Pipeline {
    /// Runs one ingestion for `provider` and records exactly one metric.
    ///
    /// Never fails: scrape errors, store errors and panics all become a
    /// `failure` metric. Runs for the same provider are serialized.
    async fn run(&self, provider: &ManagedProvider) -> IngestionMetrics {
        let _guard = provider.lock_run().await;
        let started = Instant::now();
        let mut metric = IngestionMetrics::started(provider.name());

        tracing::info!(provider = %provider.name(), "scheduler: starting ingestion run");
        let outcome = AssertUnwindSafe(self.ingest(provider)).catch_unwind().await;
        metric.duration = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match outcome {
            Ok(Ok((found, saved))) => {
                metric.status = RunStatus::Success;
                metric.coupons_found = found;
                metric.coupons_added = saved.added;
                metric.coupons_updated = saved.updated;
                tracing::info!(
                    provider = %provider.name(),
                    found,
                    added = saved.added,
                    updated = saved.updated,
                    duration_ms = metric.duration,
                    "scheduler: ingestion complete"
                );
            }
            Ok(Err(message)) => {
                metric.status = RunStatus::Failure;
                tracing::error!(
                    provider = %provider.name(),
                    error = %message,
                    duration_ms = metric.duration,
                    "scheduler: ingestion failed"
                );
                metric.error = Some(message);
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                metric.status = RunStatus::Failure;
                tracing::error!(
                    provider = %provider.name(),
                    error = %message,
                    "scheduler: ingestion panicked"
                );
                metric.error = Some(message);
            }
        }

        self.metrics.record_metric(metric.clone());
        metric
    }

    async fn ingest(&self, provider: &ManagedProvider) -> Result<(usize, SaveOutcome), String> {
        let result = provider.execute().await;
        if !result.success {
            return Err(result
                .error
                .unwrap_or_else(|| "unknown error".to_string()));
        }

        let found = result.coupons.len();
        let normalized = result
            .coupons
            .into_iter()
            .map(|raw| normalize_coupon(raw, provider.name()))
            .collect();
        let saved = self
            .store
            .save_coupons(normalized)
            .await
            .map_err(|e| e.to_string())?;
        Ok((found, saved))
    }
}

#[derive(Default)]
struct SchedulerState {
    cron: Option<JobScheduler>,
    tasks: BTreeMap<String, Uuid>,
}

/// Owns the recurring jobs for every enabled provider.
///
/// `stop()` prevents future fires but does not abort a run that is already
/// in progress.
pub struct IngestionScheduler {
    registry: Arc<ProviderRegistry>,
    pipeline: Pipeline,
    state: Mutex<SchedulerState>,
}

impl std::fmt::Debug for IngestionScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestionScheduler")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl IngestionScheduler {
    #[must_use]
    pub fn new(
        registry: Arc<ProviderRegistry>,
        store: Arc<CouponStore>,
        metrics: Arc<MetricsTracker>,
    ) -> Self {
        Self {
            registry,
            pipeline: Pipeline { store, metrics },
            state: Mutex::new(SchedulerState::default()),
        }
    }

    /// Registers a recurring job for each enabled provider and starts the
    /// cron loop. Calling it while already running only logs a warning.
    ///
    /// # Errors
    ///
    /// - [`IngestError::InvalidSchedule`] if a provider's refresh interval is
    ///   not a valid 5-, 6- or 7-field cron expression. Every schedule is
    ///   parsed before any job is registered, so nothing is scheduled.
    /// - [`IngestError::Scheduler`] if the job scheduler rejects a job or
    ///   fails to start.
    pub async fn start(&self) -> Result<(), IngestError> {
        let mut state = self.state.lock().await;
        if state.cron.is_some() {
            tracing::warn!("scheduler: already running");
            return Ok(());
        }

        let mut planned = Vec::new();
        for provider in self.registry.all() {
            if !provider.is_enabled() {
                tracing::info!(provider = %provider.name(), "scheduler: provider disabled, not scheduling");
                continue;
            }
            let invalid = || IngestError::InvalidSchedule {
                provider: provider.name().to_string(),
                expression: provider.refresh_interval().to_string(),
            };
            let schedule = to_job_schedule(provider.refresh_interval()).ok_or_else(invalid)?;

            let pipeline = self.pipeline.clone();
            let job_provider = Arc::clone(&provider);
            let job = Job::new_async(schedule.as_str(), move |_uuid, _lock| {
                let pipeline = pipeline.clone();
                let provider = Arc::clone(&job_provider);
                Box::pin(async move {
                    pipeline.run(&provider).await;
                })
            })
            .map_err(|e| {
                tracing::error!(provider = %provider.name(), schedule = %schedule, error = %e, "scheduler: unparseable schedule");
                invalid()
            })?;
            planned.push((provider, job));
        }

        let cron = JobScheduler::new().await?;
        let mut tasks = BTreeMap::new();

        for (provider, job) in planned {
            let id = cron.add(job).await?;
            tracing::info!(provider = %provider.name(), schedule = %provider.refresh_interval(), "scheduler: provider scheduled");
            tasks.insert(provider.name().to_string(), id);
        }

        cron.start().await?;
        tracing::info!(active_tasks = tasks.len(), "scheduler: started");
        state.cron = Some(cron);
        state.tasks = tasks;
        Ok(())
    }

    /// Cancels every recurring job. Calling it while stopped only logs a
    /// warning.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Scheduler`] if the job scheduler fails to shut
    /// down. The scheduler is considered stopped either way.
    pub async fn stop(&self) -> Result<(), IngestError> {
        let mut state = self.state.lock().await;
        let Some(mut cron) = state.cron.take() else {
            tracing::warn!("scheduler: not running");
            return Ok(());
        };

        for (name, id) in std::mem::take(&mut state.tasks) {
            if let Err(e) = cron.remove(&id).await {
                tracing::warn!(provider = %name, error = %e, "scheduler: failed to remove job");
            }
        }
        cron.shutdown().await?;
        tracing::info!("scheduler: stopped");
        Ok(())
    }

    /// Runs one ingestion for `provider` now, outside the cron schedule.
    pub async fn run_ingestion(&self, provider: &ManagedProvider) -> IngestionMetrics {
        self.pipeline.run(provider).await
    }

    /// Runs every enabled provider once, one after another.
    pub async fn run_all_immediately(&self) -> Vec<IngestionMetrics> {
        let providers = self.registry.enabled();
        tracing::info!(count = providers.len(), "scheduler: running all enabled providers");

        let mut results = Vec::with_capacity(providers.len());
        for provider in providers {
            results.push(self.pipeline.run(&provider).await);
        }
        results
    }

    pub async fn status(&self) -> SchedulerStatus {
        let state = self.state.lock().await;
        SchedulerStatus {
            running: state.cron.is_some(),
            active_tasks: state.tasks.len(),
            providers: state.tasks.keys().cloned().collect(),
        }
    }
}

#[cfg(test)]
#[path = "scheduler_test.rs"]
mod tests;
