//! Run metrics and derived health types shared by the ingestion core and
//! its HTTP/CLI consumers.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Success,
    Failure,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Running => write!(f, "running"),
            RunStatus::Success => write!(f, "success"),
            RunStatus::Failure => write!(f, "failure"),
        }
    }
}

/// One ingestion attempt for one provider. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionMetrics {
    pub provider: String,
    pub last_run: DateTime<Utc>,
    pub status: RunStatus,
    pub coupons_found: usize,
    pub coupons_added: usize,
    pub coupons_updated: usize,
    /// Wall-clock duration of the attempt in milliseconds.
    pub duration: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IngestionMetrics {
    /// A fresh `running` entry stamped with the current time.
    #[must_use]
    pub fn started(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            last_run: Utc::now(),
            status: RunStatus::Running,
            coupons_found: 0,
            coupons_added: 0,
            coupons_updated: 0,
            duration: 0,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Degraded,
    Down,
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthState::Healthy => write!(f, "healthy"),
            HealthState::Degraded => write!(f, "degraded"),
            HealthState::Down => write!(f, "down"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderHealth {
    pub status: HealthState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_success: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_failure: Option<DateTime<Utc>>,
    pub consecutive_failures: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    /// Milliseconds since the metrics tracker was created.
    pub uptime: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_ingestion_run: Option<DateTime<Utc>>,
    pub providers: BTreeMap<String, ProviderHealth>,
    pub total_coupons: usize,
    pub active_coupons: usize,
}
