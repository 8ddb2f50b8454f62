//! Feature modules implementing the read API
//!
//! Each feature is a vertical slice with its own `queries/` and `routes.rs`.

pub mod shared;
pub mod stories;

use axum::Router;
use sqlx::PgPool;

/// Routes for all features, before authentication is applied.
pub fn router() -> Router<PgPool> {
    Router::new().merge(stories::stories_routes())
}
