use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use std::sync::Arc;

use crate::{
    auth,
    booking::{catalog, ledger, lifecycle},
    error::AppError,
    models::*,
    AppState,
};

/// GET /api/services?min_price=&max_price=&location=&duration=&agency_id=&page=&page_size=
pub async fn list_services(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ServiceQuery>,
) -> Result<Json<ApiResponse<ServicePage>>, AppError> {
    let page = catalog::list_services(&state.db, &query).await?;
    Ok(Json(ApiResponse::success(page)))
}

/// GET /api/services/{id}
pub async fn get_service(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Service>>, AppError> {
    let service = catalog::find_service(&state.db, id).await?;
    Ok(Json(ApiResponse::success(service)))
}

/// GET /api/services/{id}/availability
pub async fn list_availability(
    State(state): State<Arc<AppState>>,
    Path(service_id): Path<i64>,
) -> Result<Json<ApiResponse<Vec<AvailabilityWindow>>>, AppError> {
    catalog::find_service(&state.db, service_id).await?;
    let windows = ledger::list_windows(&state.db, service_id).await?;
    Ok(Json(ApiResponse::success(windows)))
}

/// POST /api/services/{id}/availability
pub async fn create_availability(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(service_id): Path<i64>,
    Json(req): Json<CreateWindowRequest>,
) -> Result<(StatusCode, Json<ApiResponse<AvailabilityWindow>>), AppError> {
    let actor = auth::extract_actor(&state, &headers).await?;
    let window = ledger::create_window(&state.db, &actor, service_id, &req).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(window))))
}

/// PUT /api/services/{id}/availability/{window_id}
pub async fn reschedule_availability(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((service_id, window_id)): Path<(i64, i64)>,
    Json(req): Json<RescheduleWindowRequest>,
) -> Result<Json<ApiResponse<AvailabilityWindow>>, AppError> {
    let actor = auth::extract_actor(&state, &headers).await?;
    let window = ledger::reschedule_window(&state.db, &actor, service_id, window_id, &req).await?;
    Ok(Json(ApiResponse::success(window)))
}

/// DELETE /api/services/{id}/availability/{window_id}
pub async fn delete_availability(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((service_id, window_id)): Path<(i64, i64)>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    let actor = auth::extract_actor(&state, &headers).await?;
    ledger::delete_window(&state.db, &actor, service_id, window_id).await?;
    Ok(Json(ApiResponse::success(())))
}

/// POST /api/services/{id}/book: holds a spot in the window open right now.
pub async fn book(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(service_id): Path<i64>,
) -> Result<(StatusCode, Json<ApiResponse<CreateBookingResponse>>), AppError> {
    let actor = auth::extract_actor(&state, &headers).await?;
    let created = lifecycle::create(&state.db, &actor, service_id, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}
