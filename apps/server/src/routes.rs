use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

use crate::{handlers, AppState};

pub fn router(state: Arc<AppState>) -> Router {
    // 1. Public: health, catalog and availability reads
    let public_routes = Router::new()
        .route("/api/health", get(handlers::health::health))
        .route("/api/services", get(handlers::services::list_services))
        .route("/api/services/{id}", get(handlers::services::get_service))
        .route(
            "/api/services/{id}/availability",
            get(handlers::services::list_availability)
                .post(handlers::services::create_availability),
        )
        .route(
            "/api/services/{id}/availability/{window_id}",
            put(handlers::services::reschedule_availability)
                .delete(handlers::services::delete_availability),
        );

    // 2. Booking lifecycle
    let booking_routes = Router::new()
        .route("/api/services/{id}/book", post(handlers::services::book))
        .route("/api/bookings/my", get(handlers::bookings::my_bookings))
        .route("/api/bookings/agency", get(handlers::bookings::agency_bookings))
        .route("/api/bookings/all", get(handlers::bookings::all_bookings))
        .route("/api/bookings/{id}", get(handlers::bookings::get_booking))
        .route("/api/bookings/{id}/eticket", get(handlers::bookings::get_eticket))
        .route("/api/bookings/{id}/confirm", post(handlers::bookings::confirm_booking))
        .route("/api/bookings/{id}/complete", post(handlers::bookings::complete_booking))
        .route("/api/bookings/{id}/cancel", post(handlers::bookings::cancel_booking));

    // 3. Refund disputes
    let dispute_routes = Router::new()
        .route("/api/bookings/{id}/refund", post(handlers::disputes::open_dispute))
        .route("/api/bookings/{id}/refunds", get(handlers::disputes::booking_disputes))
        .route("/api/refunds/{id}", get(handlers::disputes::get_dispute))
        .route("/api/refunds/{id}/respond", post(handlers::disputes::respond))
        .route("/api/refunds/{id}/verdict", post(handlers::disputes::verdict));

    Router::new()
        .merge(public_routes)
        .merge(booking_routes)
        .merge(dispute_routes)
        .with_state(state)
}
