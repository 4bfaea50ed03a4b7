use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use std::sync::Arc;

use crate::{auth, booking::dispute, error::AppError, models::*, AppState};

type DisputeResult = Result<Json<ApiResponse<RefundDispute>>, AppError>;

/// POST /api/bookings/{id}/refund
pub async fn open_dispute(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(booking_id): Path<i64>,
    Json(req): Json<OpenDisputeRequest>,
) -> Result<(StatusCode, Json<ApiResponse<RefundDispute>>), AppError> {
    let actor = auth::extract_actor(&state, &headers).await?;
    let opened = dispute::open(&state.db, booking_id, &actor, &req, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(opened))))
}

/// GET /api/bookings/{id}/refunds
pub async fn booking_disputes(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(booking_id): Path<i64>,
) -> Result<Json<ApiResponse<Vec<RefundDispute>>>, AppError> {
    let actor = auth::extract_actor(&state, &headers).await?;
    let disputes = dispute::list_for_booking(&state.db, booking_id, &actor).await?;
    Ok(Json(ApiResponse::success(disputes)))
}

/// GET /api/refunds/{id}
pub async fn get_dispute(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> DisputeResult {
    let actor = auth::extract_actor(&state, &headers).await?;
    let found = dispute::get(&state.db, id, &actor).await?;
    Ok(Json(ApiResponse::success(found)))
}

/// POST /api/refunds/{id}/respond
pub async fn respond(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(req): Json<AgencyResponseRequest>,
) -> DisputeResult {
    let actor = auth::extract_actor(&state, &headers).await?;
    let updated = dispute::agency_respond(&state.db, id, &actor, &req.response).await?;
    Ok(Json(ApiResponse::success(updated)))
}

/// POST /api/refunds/{id}/verdict
pub async fn verdict(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(req): Json<VerdictRequest>,
) -> DisputeResult {
    let actor = auth::extract_actor(&state, &headers).await?;
    let resolved = dispute::admin_resolve(&state.db, id, &actor, &req.verdict, Utc::now()).await?;
    Ok(Json(ApiResponse::success(resolved)))
}
