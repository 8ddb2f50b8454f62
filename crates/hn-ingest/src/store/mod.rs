//! Story store abstraction
//!
//! A [`StoryStore`] is the run-scoped session: it is opened once per ETL run
//! by a [`StoreConnector`], handed by reference to the reconciler and the
//! error log, and closed exactly once when the run ends. All writes happen
//! inside a [`StoreTransaction`].

use async_trait::async_trait;
use hn_common::Story;
use thiserror::Error;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::{PgConnector, PgStore};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("{0}")]
    Db(#[from] crate::db::DbError),

    #[error("Story {0} already exists")]
    Conflict(i64),

    #[error("Story {0} not found")]
    NotFound(i64),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Opens a run-scoped store session.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    type Store: StoryStore + 'static;

    async fn connect(&self) -> StoreResult<Self::Store>;
}

/// Run-scoped store session.
#[async_trait]
pub trait StoryStore: Send + Sync {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>>;

    /// Release the session. Called once, at the end of the run.
    async fn close(&self);
}

/// One unit of work. Dropping without `commit` discards the writes.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Look up a story, locking the row until the transaction ends.
    async fn find_story(&mut self, id: i64) -> StoreResult<Option<Story>>;

    async fn insert_story(&mut self, story: &Story) -> StoreResult<()>;

    async fn update_counters(
        &mut self,
        id: i64,
        score: Option<i32>,
        descendants: Option<i32>,
    ) -> StoreResult<()>;

    async fn insert_error(&mut self, story_id: Option<i64>, message: &str) -> StoreResult<()>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;

    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}
