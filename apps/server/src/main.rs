mod auth;
mod booking;
mod config;
mod db;
mod error;
mod handlers;
mod models;
mod routes;
#[cfg(test)]
mod testutil;

use anyhow::Context;
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use config::Config;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub db: sqlx::SqlitePool,
    pub session_max_age: Option<chrono::Duration>,
    pub started_at: Instant,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = EnvFilter::from_default_env().add_directive("info".parse()?);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    // ── Database ──
    let pool = SqlitePoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await
        .with_context(|| format!("connecting to {}", config.database_url))?;

    db::run_migrations(&pool).await?;

    if config.session_max_age.is_none() {
        tracing::warn!("SESSION_MAX_AGE_SECS not set, sessions never expire");
    }

    let state = Arc::new(AppState {
        db: pool,
        session_max_age: config.session_max_age,
        started_at: Instant::now(),
    });

    // ── CORS: whitelist CORS_ORIGIN when configured, otherwise allow any ──
    let cors = match &config.cors_origin {
        Some(origin) => {
            let origin: axum::http::HeaderValue =
                origin.parse().context("CORS_ORIGIN must be a valid header value")?;
            CorsLayer::new()
                .allow_origin(AllowOrigin::exact(origin))
                .allow_methods(Any)
                .allow_headers(Any)
        }
        None => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    };

    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr = config.bind_addr();
    tracing::info!("GetLost booking server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
