use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use couponhub_core::Coupon;
use serde::Deserialize;

use crate::middleware::RequestId;

use super::{ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct CouponsQuery {
    pub vendor: Option<String>,
}

pub(super) async fn list_coupons(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<CouponsQuery>,
) -> Json<ApiResponse<Vec<Coupon>>> {
    let coupons = match query.vendor.as_deref().map(str::trim) {
        Some(vendor) if !vendor.is_empty() => state.service.coupons_by_vendor(vendor).await,
        _ => state.service.coupons().await,
    };
    Json(ApiResponse::new(coupons, req_id.0))
}

pub(super) async fn list_active_coupons(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Json<ApiResponse<Vec<Coupon>>> {
    Json(ApiResponse::new(state.service.active_coupons().await, req_id.0))
}

pub(super) async fn get_coupon(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Coupon>>, ApiError> {
    match state.service.coupon(&id).await {
        Some(coupon) => Ok(Json(ApiResponse::new(coupon, req_id.0))),
        None => Err(ApiError::new(
            req_id.0,
            "not_found",
            format!("coupon not found: {id}"),
        )),
    }
}
