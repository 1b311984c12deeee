use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    Extension, Json,
};
use couponhub_core::{HealthStatus, IngestionMetrics};
use couponhub_ingest::{ProviderSummary, SchedulerStatus};
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{normalize_limit, ApiError, ApiResponse, AppState};

pub(super) async fn health_status(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Json<ApiResponse<HealthStatus>> {
    Json(ApiResponse::new(state.service.health_status().await, req_id.0))
}

#[derive(Debug, Deserialize)]
pub(super) struct MetricsQuery {
    pub provider: Option<String>,
    pub limit: Option<usize>,
}

/// One provider's history, or every provider's keyed by name.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub(super) enum MetricsData {
    Provider(Vec<IngestionMetrics>),
    All(BTreeMap<String, Vec<IngestionMetrics>>),
}

pub(super) async fn list_metrics(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<MetricsQuery>,
) -> Result<Json<ApiResponse<MetricsData>>, ApiError> {
    let limit = normalize_limit(query.limit);

    let data = match query.provider {
        Some(name) => {
            if !state.service.has_provider(&name) {
                return Err(ApiError::new(
                    req_id.0,
                    "not_found",
                    format!("provider not found: {name}"),
                ));
            }
            MetricsData::Provider(state.service.metrics(&name, limit))
        }
        None => MetricsData::All(
            state
                .service
                .all_metrics()
                .into_iter()
                .map(|(name, entries)| {
                    let skip = entries.len().saturating_sub(limit);
                    (name, entries.into_iter().skip(skip).collect())
                })
                .collect(),
        ),
    };

    Ok(Json(ApiResponse::new(data, req_id.0)))
}

pub(super) async fn scheduler_status(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Json<ApiResponse<SchedulerStatus>> {
    Json(ApiResponse::new(state.service.scheduler_status().await, req_id.0))
}

pub(super) async fn list_providers(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Json<ApiResponse<Vec<ProviderSummary>>> {
    Json(ApiResponse::new(state.service.providers(), req_id.0))
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct RunRequest {
    pub provider: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct RunAccepted {
    status: &'static str,
    provider: Option<String>,
}

/// Validates the target synchronously, then runs ingestion in the background
/// and answers `202 Accepted`. An empty body runs every enabled provider.
pub(super) async fn trigger_run(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    body: Bytes,
) -> Result<(StatusCode, Json<ApiResponse<RunAccepted>>), ApiError> {
    let request: RunRequest = if body.iter().all(u8::is_ascii_whitespace) {
        RunRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| {
            ApiError::new(
                req_id.0.clone(),
                "bad_request",
                format!("invalid request body: {e}"),
            )
        })?
    };

    if let Some(name) = &request.provider {
        if !state.service.has_provider(name) {
            return Err(ApiError::new(
                req_id.0,
                "not_found",
                format!("provider not found: {name}"),
            ));
        }
    }

    let service = Arc::clone(&state.service);
    let target = request.provider.clone();
    tokio::spawn(async move {
        match service.run_ingestion_now(target.as_deref()).await {
            Ok(results) => {
                tracing::info!(runs = results.len(), "api: triggered ingestion finished");
            }
            Err(e) => tracing::error!(error = %e, "api: triggered ingestion failed"),
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::new(
            RunAccepted {
                status: "accepted",
                provider: request.provider,
            },
            req_id.0,
        )),
    ))
}
