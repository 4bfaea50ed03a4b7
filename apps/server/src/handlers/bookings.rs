use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use std::sync::Arc;

use crate::{auth, booking::lifecycle, error::AppError, models::*, AppState};

type BookingResult = Result<Json<ApiResponse<Booking>>, AppError>;
type DetailList = Result<Json<ApiResponse<Vec<BookingDetail>>>, AppError>;

/// GET /api/bookings/my
pub async fn my_bookings(State(state): State<Arc<AppState>>, headers: HeaderMap) -> DetailList {
    let actor = auth::extract_actor(&state, &headers).await?;
    let bookings = lifecycle::list_for_customer(&state.db, &actor).await?;
    Ok(Json(ApiResponse::success(bookings)))
}

/// GET /api/bookings/agency
pub async fn agency_bookings(State(state): State<Arc<AppState>>, headers: HeaderMap) -> DetailList {
    let actor = auth::extract_actor(&state, &headers).await?;
    let bookings = lifecycle::list_for_agency(&state.db, &actor).await?;
    Ok(Json(ApiResponse::success(bookings)))
}

/// GET /api/bookings/all
pub async fn all_bookings(State(state): State<Arc<AppState>>, headers: HeaderMap) -> DetailList {
    let actor = auth::extract_actor(&state, &headers).await?;
    let bookings = lifecycle::list_all(&state.db, &actor).await?;
    Ok(Json(ApiResponse::success(bookings)))
}

/// GET /api/bookings/{id}
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<BookingDetail>>, AppError> {
    let actor = auth::extract_actor(&state, &headers).await?;
    let detail = lifecycle::get(&state.db, id, &actor).await?;
    Ok(Json(ApiResponse::success(detail)))
}

/// GET /api/bookings/{id}/eticket
pub async fn get_eticket(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<ETicket>>, AppError> {
    let actor = auth::extract_actor(&state, &headers).await?;
    let ticket = lifecycle::eticket(&state.db, id, &actor).await?;
    Ok(Json(ApiResponse::success(ticket)))
}

/// POST /api/bookings/{id}/confirm
pub async fn confirm_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> BookingResult {
    let actor = auth::extract_actor(&state, &headers).await?;
    let booking = lifecycle::confirm(&state.db, id, &actor).await?;
    Ok(Json(ApiResponse::success(booking)))
}

/// POST /api/bookings/{id}/complete
pub async fn complete_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> BookingResult {
    let actor = auth::extract_actor(&state, &headers).await?;
    let booking = lifecycle::complete(&state.db, id, &actor).await?;
    Ok(Json(ApiResponse::success(booking)))
}

/// POST /api/bookings/{id}/cancel: also returns the spot to its window.
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> BookingResult {
    let actor = auth::extract_actor(&state, &headers).await?;
    let booking = lifecycle::cancel(&state.db, id, &actor).await?;
    Ok(Json(ApiResponse::success(booking)))
}
