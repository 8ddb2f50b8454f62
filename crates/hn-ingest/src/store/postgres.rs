//! PostgreSQL-backed story store

use async_trait::async_trait;
use hn_common::Story;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;

use super::{StoreConnector, StoreError, StoreResult, StoreTransaction, StoryStore};
use crate::db::{create_pool, DbConfig};

/// Opens a dedicated connection pool for each run.
#[derive(Debug, Clone)]
pub struct PgConnector {
    config: DbConfig,
}

impl PgConnector {
    pub fn new(config: DbConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl StoreConnector for PgConnector {
    type Store = PgStore;

    async fn connect(&self) -> StoreResult<PgStore> {
        let pool = create_pool(&self.config).await?;
        Ok(PgStore::new(pool))
    }
}

/// Session over a pool owned by one run; `close` shuts the pool down.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl StoryStore for PgStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTransaction { tx }))
    }

    async fn close(&self) {
        self.pool.close().await;
        debug!("Database pool closed");
    }
}

/// Column list matching [`StoryRow`].
pub const STORY_COLUMNS: &str = "id, title, score, url, author, time, descendants, type";

/// `stories` row as read by sqlx.
#[derive(Debug, sqlx::FromRow)]
pub struct StoryRow {
    id: i64,
    title: Option<String>,
    score: Option<i32>,
    url: Option<String>,
    author: Option<String>,
    time: Option<i64>,
    descendants: Option<i32>,
    #[sqlx(rename = "type")]
    kind: Option<String>,
}

impl From<StoryRow> for Story {
    fn from(row: StoryRow) -> Self {
        Story {
            id: row.id,
            title: row.title,
            score: row.score,
            url: row.url,
            author: row.author,
            time: row.time,
            descendants: row.descendants,
            kind: row.kind,
        }
    }
}

pub struct PgTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PgTransaction {
    async fn find_story(&mut self, id: i64) -> StoreResult<Option<Story>> {
        let sql = format!("SELECT {} FROM stories WHERE id = $1 FOR UPDATE", STORY_COLUMNS);
        let row = sqlx::query_as::<_, StoryRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(row.map(Story::from))
    }

    async fn insert_story(&mut self, story: &Story) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO stories (id, title, score, url, author, time, descendants, type)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(story.id)
        .bind(story.title.as_deref())
        .bind(story.score)
        .bind(story.url.as_deref())
        .bind(story.author.as_deref())
        .bind(story.time)
        .bind(story.descendants)
        .bind(story.kind.as_deref())
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn update_counters(
        &mut self,
        id: i64,
        score: Option<i32>,
        descendants: Option<i32>,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE stories
            SET score = $2, descendants = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(score)
        .bind(descendants)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn insert_error(&mut self, story_id: Option<i64>, message: &str) -> StoreResult<()> {
        sqlx::query("INSERT INTO etl_errors (story_id, error_message) VALUES ($1, $2)")
            .bind(story_id)
            .bind(message)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
