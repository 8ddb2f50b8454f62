use serde::{Deserialize, Serialize};
use sqlx::PgPool;

/// Number of authors returned by the leaderboard.
pub const TOP_AUTHORS_LIMIT: i64 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuthorScore {
    pub author: Option<String>,
    pub total_score: Option<i64>,
}

/// Authors ranked by the summed score of their stored stories.
#[tracing::instrument(skip(pool))]
pub async fn handle(pool: PgPool) -> Result<Vec<AuthorScore>, sqlx::Error> {
    sqlx::query_as::<_, AuthorScore>(
        r#"
        SELECT author, SUM(score)::BIGINT AS total_score
        FROM stories
        GROUP BY author
        ORDER BY total_score DESC NULLS LAST, author
        LIMIT $1
        "#,
    )
    .bind(TOP_AUTHORS_LIMIT)
    .fetch_all(&pool)
    .await
}
