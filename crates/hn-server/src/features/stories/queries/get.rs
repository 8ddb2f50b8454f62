use hn_common::Story;
use hn_ingest::store::postgres::{StoryRow, STORY_COLUMNS};
use sqlx::PgPool;

use crate::features::stories::StoryResponse;

#[derive(Debug, Clone, Copy)]
pub struct GetStoryQuery {
    pub id: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum GetStoryError {
    #[error("Story not found")]
    NotFound(i64),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[tracing::instrument(skip(pool))]
pub async fn handle(pool: PgPool, query: GetStoryQuery) -> Result<StoryResponse, GetStoryError> {
    let sql = format!("SELECT {} FROM stories WHERE id = $1", STORY_COLUMNS);
    let row = sqlx::query_as::<_, StoryRow>(&sql)
        .bind(query.id)
        .fetch_optional(&pool)
        .await?
        .ok_or(GetStoryError::NotFound(query.id))?;

    Ok(StoryResponse::from(Story::from(row)))
}
