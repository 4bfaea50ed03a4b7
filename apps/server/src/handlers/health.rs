use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub db_ok: bool,
    /// Windows that still have at least one spot; `None` when the query fails.
    pub open_windows: Option<i64>,
}

/// GET /api/health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let open_windows: Option<i64> =
        sqlx::query_scalar("SELECT COUNT(*) FROM availability_windows WHERE remaining_spots > 0")
            .fetch_one(&state.db)
            .await
            .map_err(|e| tracing::error!("health check query failed: {}", e))
            .ok();
    let db_ok = open_windows.is_some();

    Json(HealthResponse {
        status: if db_ok { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started_at.elapsed().as_secs(),
        db_ok,
        open_windows,
    })
}
