//! hn-pulse Read API
//!
//! HTTP API over the stories reconciled by `hn-ingest`.
//!
//! - **Stories**: filtered, paginated listing, lookup by id, author leaderboard
//! - **Middleware**: API-key authentication, per-IP rate limiting, CORS and
//!   request tracing
//! - **ETL**: optionally runs the ingest scheduler in-process (`ETL_ENABLED`)

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod api;
pub mod config;
pub mod error;
pub mod features;
pub mod middleware;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use sqlx::PgPool;
use tower_http::compression::CompressionLayer;

use crate::config::CorsConfig;
use crate::middleware::auth::{require_api_key, ApiKey};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub api_key: ApiKey,
}

/// Build the application router. Rate limiting is applied separately by
/// [`middleware::rate_limit::with_rate_limit`].
pub fn build_router(state: AppState, cors: &CorsConfig) -> Router {
    let protected = features::router()
        .route_layer(axum::middleware::from_fn_with_state(
            state.api_key.clone(),
            require_api_key,
        ))
        .with_state(state.db.clone());

    Router::new()
        .route("/health", get(health_check))
        .with_state(state.db)
        .merge(protected)
        .layer(CompressionLayer::new())
        .layer(middleware::tracing_layer())
        .layer(middleware::cors_layer(cors))
}

/// Health check handler
async fn health_check(State(db): State<PgPool>) -> Response {
    match hn_ingest::db::health_check(&db).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "database": "connected"
            })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Database health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "database": "disconnected"
                })),
            )
                .into_response()
        },
    }
}
