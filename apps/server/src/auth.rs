use axum::http::{header, HeaderMap};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;

use crate::{error::AppError, models::Role, AppState};

/// The authenticated user behind a request. Passed explicitly into every
/// core operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: i64,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: i64, role: Role) -> Self {
        Self { user_id, role }
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    user_id: i64,
    role: Role,
    created_at: DateTime<Utc>,
}

/// Sessions are stored by the SHA-256 digest of their bearer token, never the token itself.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Header format: `Bearer <token>`
pub fn bearer_token(auth_header: &str) -> Option<&str> {
    let token = auth_header.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

/// Resolve a bearer token to its actor. Sessions older than `max_age` are ignored.
pub async fn lookup_session(
    db: &SqlitePool,
    token: &str,
    max_age: Option<chrono::Duration>,
) -> Result<Option<Actor>, sqlx::Error> {
    let row = sqlx::query_as::<_, SessionRow>(
        "SELECT u.id AS user_id, u.role, s.created_at
         FROM user_sessions s
         JOIN users u ON u.id = s.user_id
         WHERE s.token_hash = ?",
    )
    .bind(hash_token(token))
    .fetch_optional(db)
    .await?;

    let Some(row) = row else { return Ok(None) };

    if let Some(max_age) = max_age {
        let age = Utc::now() - row.created_at;
        if age > max_age {
            tracing::warn!(user_id = row.user_id, age_secs = age.num_seconds(), "session expired");
            return Ok(None);
        }
    }

    Ok(Some(Actor::new(row.user_id, row.role)))
}

/// Extract the actor from the Authorization header.
pub async fn extract_actor(state: &AppState, headers: &HeaderMap) -> Result<Actor, AppError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::Unauthorized("missing Authorization header"))?;

    let token = bearer_token(auth_header).ok_or(AppError::Unauthorized("malformed bearer token"))?;

    lookup_session(&state.db, token, state.session_max_age)
        .await?
        .ok_or(AppError::Unauthorized("invalid or expired session"))
}
