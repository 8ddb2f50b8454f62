//! Stories API routes
//!
//! - `GET /stories` - List stories by score, with filters and pagination
//! - `GET /stories/:id` - Get a single story
//! - `GET /stats/top-authors` - Authors with the highest summed score

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde_json::json;
use sqlx::PgPool;

use super::queries::{self, GetStoryError, GetStoryQuery, ListStoriesError, ListStoriesQuery};
use crate::api::response::ApiResponse;
use crate::error::AppError;

pub fn stories_routes() -> Router<PgPool> {
    Router::new()
        .route("/stories", get(list_stories))
        .route("/stories/:id", get(get_story))
        .route("/stats/top-authors", get(top_authors))
}

/// List stories
///
/// `GET /stories?page=1&limit=20&author=pg&min_score=100&search=rust`
///
/// - `page` - Page number (default: 1)
/// - `limit` - Items per page (default: 20, range 0-20)
/// - `author` - Case-insensitive author substring
/// - `min_score` - Minimum score (0 disables)
/// - `search` - Case-insensitive title substring
#[tracing::instrument(
    skip(pool, query),
    fields(page = ?query.page, limit = ?query.limit)
)]
async fn list_stories(
    State(pool): State<PgPool>,
    Query(query): Query<ListStoriesQuery>,
) -> Result<Response, AppError> {
    let response = queries::list::handle(pool, query).await?;

    tracing::debug!(
        count = response.items.len(),
        total = response.pagination.total,
        "Stories listed via API"
    );

    let meta = json!({ "pagination": response.pagination });
    Ok(ApiResponse::success_with_meta(response.items, meta).into_response())
}

/// Get a single story
///
/// `GET /stories/:id` - `404 Not Found` when no story has that id.
#[tracing::instrument(skip(pool))]
async fn get_story(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let story = queries::get::handle(pool, GetStoryQuery { id }).await?;
    Ok(ApiResponse::success(story).into_response())
}

#[tracing::instrument(skip(pool))]
async fn top_authors(State(pool): State<PgPool>) -> Result<Response, AppError> {
    let authors = queries::top_authors::handle(pool).await?;
    Ok(ApiResponse::success(authors).into_response())
}

impl From<ListStoriesError> for AppError {
    fn from(err: ListStoriesError) -> Self {
        match err {
            ListStoriesError::InvalidPagination(message) => AppError::Validation(message.to_string()),
            ListStoriesError::Database(e) => AppError::Database(e),
        }
    }
}

impl From<GetStoryError> for AppError {
    fn from(err: GetStoryError) -> Self {
        match err {
            GetStoryError::NotFound(_) => AppError::NotFound("Story not found".to_string()),
            GetStoryError::Database(e) => AppError::Database(e),
        }
    }
}
