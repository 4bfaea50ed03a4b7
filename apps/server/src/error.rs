use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ApiResponse;

/// Every failure a request can end in. Core operations return these
/// directly; the boundary turns them into a status code and envelope.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("forbidden: {0}")]
    Forbidden(&'static str),

    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    #[error("no availability for this service")]
    NoAvailability,

    #[error("capacity exhausted for availability window {0}")]
    CapacityExhausted(i64),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("unauthorized: {0}")]
    Unauthorized(&'static str),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("database error")]
    Database(#[from] sqlx::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::InvalidTransition(_)
            | AppError::NoAvailability
            | AppError::CapacityExhausted(_)
            | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Maps a unique-constraint violation to `Conflict`, anything else to `Database`.
    pub fn from_unique(err: sqlx::Error, what: &str) -> Self {
        let unique = err
            .as_database_error()
            .is_some_and(|db| db.is_unique_violation());
        if unique {
            AppError::Conflict(format!("{} already exists", what))
        } else {
            AppError::Database(err)
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Internal details stay in the log
        let message = match &self {
            AppError::Database(e) => {
                tracing::error!(error = ?e, "database error");
                "Internal error".to_string()
            }
            other => {
                tracing::warn!(status = status.as_u16(), "request rejected: {}", other);
                other.to_string()
            }
        };

        (status, Json(ApiResponse::<()>::error(message))).into_response()
    }
}
