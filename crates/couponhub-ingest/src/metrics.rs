//! Bounded per-provider run history and the health summary derived from it.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use couponhub_core::{HealthState, HealthStatus, IngestionMetrics, ProviderHealth, RunStatus};

/// Consecutive failures at which a provider is reported `down`.
pub const DOWN_THRESHOLD: usize = 5;
/// Consecutive failures at which a provider is reported `degraded`.
pub const DEGRADED_THRESHOLD: usize = 2;

#[derive(Debug)]
pub struct MetricsTracker {
    history_cap: usize,
    started: Instant,
    history: Mutex<BTreeMap<String, VecDeque<IngestionMetrics>>>,
}

impl MetricsTracker {
    /// `history_cap` is clamped to at least one entry per provider.
    #[must_use]
    pub fn new(history_cap: usize) -> Self {
        Self {
            history_cap: history_cap.max(1),
            started: Instant::now(),
            history: Mutex::new(BTreeMap::new()),
        }
    }

    #[must_use]
    pub fn history_cap(&self) -> usize {
        self.history_cap
    }

    /// Makes `provider` appear in health reports before its first run.
    pub fn register_provider(&self, provider: &str) {
        self.lock().entry(provider.to_string()).or_default();
    }

    /// Appends `metric` to its provider's history, evicting the oldest entry
    /// once the cap is exceeded.
    pub fn record_metric(&self, metric: IngestionMetrics) {
        let mut history = self.lock();
        let entries = history.entry(metric.provider.clone()).or_default();
        entries.push_back(metric);
        while entries.len() > self.history_cap {
            entries.pop_front();
        }
    }

    /// The most recent `limit` entries for `provider`, oldest first.
    #[must_use]
    pub fn metrics(&self, provider: &str, limit: usize) -> Vec<IngestionMetrics> {
        self.lock()
            .get(provider)
            .map(|entries| {
                let skip = entries.len().saturating_sub(limit);
                entries.iter().skip(skip).cloned().collect()
            })
            .unwrap_or_default()
    }

    /// Full retained history for every provider.
    #[must_use]
    pub fn all_metrics(&self) -> BTreeMap<String, Vec<IngestionMetrics>> {
        self.lock()
            .iter()
            .map(|(name, entries)| (name.clone(), entries.iter().cloned().collect()))
            .collect()
    }

    #[must_use]
    pub fn last_metric(&self, provider: &str) -> Option<IngestionMetrics> {
        self.lock().get(provider).and_then(|e| e.back().cloned())
    }

    /// Drops history for one provider, or for all providers when `None`.
    /// Registered providers stay registered.
    pub fn clear(&self, provider: Option<&str>) {
        let mut history = self.lock();
        match provider {
            Some(name) => {
                if let Some(entries) = history.get_mut(name) {
                    entries.clear();
                }
            }
            None => history.values_mut().for_each(VecDeque::clear),
        }
    }

    /// Builds the health report.
    ///
    /// Per provider, runs are ordered newest first; `consecutive_failures`
    /// counts leading failures. Five or more is `down`; two or more, or a
    /// failed latest run, is `degraded`; anything else is `healthy`. A
    /// provider with no runs is `down` with zero failures.
    #[must_use]
    pub fn health_status(&self, total_coupons: usize, active_coupons: usize) -> HealthStatus {
        let history = self.lock();
        let mut providers = BTreeMap::new();

        for (name, entries) in history.iter() {
            providers.insert(name.clone(), provider_health(entries));
        }

        let last_ingestion_run = history
            .values()
            .flat_map(|entries| entries.iter().map(|m| m.last_run))
            .max();

        HealthStatus {
            uptime: u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX),
            last_ingestion_run,
            providers,
            total_coupons,
            active_coupons,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, VecDeque<IngestionMetrics>>> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn provider_health(entries: &VecDeque<IngestionMetrics>) -> ProviderHealth {
    if entries.is_empty() {
        return ProviderHealth {
            status: HealthState::Down,
            last_success: None,
            last_failure: None,
            consecutive_failures: 0,
        };
    }

    // Newest-recorded first, then a stable sort so equal timestamps keep
    // recording order.
    let mut sorted: Vec<&IngestionMetrics> = entries.iter().rev().collect();
    sorted.sort_by(|a, b| b.last_run.cmp(&a.last_run));

    let consecutive_failures = sorted
        .iter()
        .take_while(|m| m.status == RunStatus::Failure)
        .count();
    let latest_failed = sorted.first().is_some_and(|m| m.status == RunStatus::Failure);

    let status = if consecutive_failures >= DOWN_THRESHOLD {
        HealthState::Down
    } else if consecutive_failures >= DEGRADED_THRESHOLD || latest_failed {
        HealthState::Degraded
    } else {
        HealthState::Healthy
    };

    ProviderHealth {
        status,
        last_success: sorted
            .iter()
            .find(|m| m.status == RunStatus::Success)
            .map(|m| m.last_run),
        last_failure: sorted
            .iter()
            .find(|m| m.status == RunStatus::Failure)
            .map(|m| m.last_run),
        consecutive_failures,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, Utc};

    use super::*;
    use RunStatus::{Failure, Success};

    fn metric(provider: &str, status: RunStatus, at: DateTime<Utc>) -> IngestionMetrics {
        IngestionMetrics {
            last_run: at,
            status,
            ..IngestionMetrics::started(provider)
        }
    }

    /// Records `statuses` oldest first, one minute apart.
    fn tracker_with(statuses: &[RunStatus]) -> (MetricsTracker, DateTime<Utc>) {
        let tracker = MetricsTracker::new(100);
        let base = Utc::now() - Duration::hours(1);
        for (i, status) in statuses.iter().enumerate() {
            let at = base + Duration::minutes(i64::try_from(i).unwrap());
            tracker.record_metric(metric("UberEats", *status, at));
        }
        (tracker, base)
    }

    fn health_of(tracker: &MetricsTracker) -> ProviderHealth {
        tracker.health_status(0, 0).providers["UberEats"].clone()
    }

    #[test]
    fn five_trailing_failures_is_down() {
        let (tracker, _) = tracker_with(&[Success, Failure, Failure, Failure, Failure, Failure]);
        let health = health_of(&tracker);
        assert_eq!(health.status, HealthState::Down);
        assert_eq!(health.consecutive_failures, 5);
    }

    #[test]
    fn two_to_four_trailing_failures_is_degraded() {
        for n in 2..=4 {
            let mut statuses = vec![Success];
            statuses.extend(std::iter::repeat_n(Failure, n));
            let (tracker, _) = tracker_with(&statuses);
            let health = health_of(&tracker);
            assert_eq!(health.status, HealthState::Degraded, "{n} failures");
            assert_eq!(health.consecutive_failures, n);
        }
    }

    #[test]
    fn single_latest_failure_is_degraded() {
        let (tracker, _) = tracker_with(&[Success, Success, Failure]);
        let health = health_of(&tracker);
        assert_eq!(health.status, HealthState::Degraded);
        assert_eq!(health.consecutive_failures, 1);
    }

    #[test]
    fn latest_success_is_healthy() {
        let (tracker, base) = tracker_with(&[Failure, Failure, Failure, Success]);
        let health = health_of(&tracker);
        assert_eq!(health.status, HealthState::Healthy);
        assert_eq!(health.consecutive_failures, 0);
        assert_eq!(health.last_success, Some(base + Duration::minutes(3)));
        assert_eq!(health.last_failure, Some(base + Duration::minutes(2)));
    }

    #[test]
    fn ordering_uses_last_run_not_insertion() {
        let tracker = MetricsTracker::new(10);
        let now = Utc::now();
        // Success recorded last but ran first.
        tracker.record_metric(metric("UberEats", Failure, now));
        tracker.record_metric(metric("UberEats", Failure, now - Duration::minutes(1)));
        tracker.record_metric(metric("UberEats", Success, now - Duration::minutes(2)));
        let health = health_of(&tracker);
        assert_eq!(health.consecutive_failures, 2);
        assert_eq!(health.status, HealthState::Degraded);
    }

    #[test]
    fn registered_provider_without_runs_is_down() {
        let tracker = MetricsTracker::new(10);
        tracker.register_provider("DoorDash");
        let status = tracker.health_status(3, 2);
        let health = &status.providers["DoorDash"];
        assert_eq!(health.status, HealthState::Down);
        assert_eq!(health.consecutive_failures, 0);
        assert!(health.last_success.is_none());
        assert!(status.last_ingestion_run.is_none());
        assert_eq!((status.total_coupons, status.active_coupons), (3, 2));
    }

    #[test]
    fn history_is_capped_fifo() {
        let tracker = MetricsTracker::new(3);
        let base = Utc::now();
        for i in 0..5 {
            tracker.record_metric(metric("UberEats", Success, base + Duration::seconds(i)));
        }
        let kept = tracker.metrics("UberEats", 10);
        assert_eq!(kept.len(), 3);
        assert_eq!(kept[0].last_run, base + Duration::seconds(2));
        assert_eq!(kept[2].last_run, base + Duration::seconds(4));
    }

    #[test]
    fn metrics_limit_returns_most_recent() {
        let (tracker, base) = tracker_with(&[Success, Failure, Success, Success]);
        let recent = tracker.metrics("UberEats", 2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].last_run, base + Duration::minutes(2));
        assert_eq!(recent[1].last_run, base + Duration::minutes(3));
        assert!(tracker.metrics("Unknown", 5).is_empty());
    }

    #[test]
    fn last_ingestion_run_is_max_across_providers() {
        let tracker = MetricsTracker::new(10);
        let now = Utc::now();
        tracker.record_metric(metric("UberEats", Success, now - Duration::minutes(5)));
        tracker.record_metric(metric("DoorDash", Failure, now));
        assert_eq!(tracker.health_status(0, 0).last_ingestion_run, Some(now));
    }

    #[test]
    fn clear_keeps_registration() {
        let (tracker, _) = tracker_with(&[Success, Failure]);
        tracker.record_metric(metric("DoorDash", Success, Utc::now()));

        tracker.clear(Some("UberEats"));
        assert!(tracker.last_metric("UberEats").is_none());
        assert!(tracker.last_metric("DoorDash").is_some());

        tracker.clear(None);
        let all = tracker.all_metrics();
        assert_eq!(all.len(), 2);
        assert!(all.values().all(Vec::is_empty));
    }
}
