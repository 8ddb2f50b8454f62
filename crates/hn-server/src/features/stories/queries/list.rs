use hn_common::Story;
use hn_ingest::store::postgres::{StoryRow, STORY_COLUMNS};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::features::shared::pagination::{PageParams, PaginationMetadata};
use crate::features::stories::{contains_pattern, StoryResponse};

/// `GET /stories` filters. All filters combine with AND.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListStoriesQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    /// Case-insensitive substring of the author.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Minimum score; 0 disables the filter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_score: Option<i32>,
    /// Case-insensitive substring of the title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListStoriesResponse {
    pub items: Vec<StoryResponse>,
    pub pagination: PaginationMetadata,
}

#[derive(Debug, thiserror::Error)]
pub enum ListStoriesError {
    #[error("{0}")]
    InvalidPagination(&'static str),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ListStoriesQuery {
    pub fn pagination(&self) -> PageParams {
        PageParams::new(self.page, self.limit)
    }

    pub fn validate(&self) -> Result<(), ListStoriesError> {
        self.pagination()
            .validate()
            .map_err(ListStoriesError::InvalidPagination)
    }

    fn author_pattern(&self) -> Option<String> {
        non_blank(&self.author).map(contains_pattern)
    }

    fn title_pattern(&self) -> Option<String> {
        non_blank(&self.search).map(contains_pattern)
    }

    fn min_score(&self) -> Option<i32> {
        self.min_score.filter(|score| *score != 0)
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

const FILTER: &str = r#"
    WHERE ($1::TEXT IS NULL OR author ILIKE $1)
      AND ($2::INTEGER IS NULL OR score >= $2)
      AND ($3::TEXT IS NULL OR title ILIKE $3)
"#;

#[tracing::instrument(skip(pool))]
pub async fn handle(
    pool: PgPool,
    query: ListStoriesQuery,
) -> Result<ListStoriesResponse, ListStoriesError> {
    query.validate()?;

    let params = query.pagination();
    let author = query.author_pattern();
    let title = query.title_pattern();
    let min_score = query.min_score();

    let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM stories {}", FILTER))
        .bind(author.as_deref())
        .bind(min_score)
        .bind(title.as_deref())
        .fetch_one(&pool)
        .await?;

    let sql = format!(
        "SELECT {} FROM stories {} ORDER BY score DESC NULLS LAST, id LIMIT $4 OFFSET $5",
        STORY_COLUMNS, FILTER
    );
    let rows = sqlx::query_as::<_, StoryRow>(&sql)
        .bind(author.as_deref())
        .bind(min_score)
        .bind(title.as_deref())
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(&pool)
        .await?;

    let items = rows
        .into_iter()
        .map(|row| StoryResponse::from(Story::from(row)))
        .collect();

    Ok(ListStoriesResponse {
        items,
        pagination: PaginationMetadata::from_params(&params, total),
    })
}
