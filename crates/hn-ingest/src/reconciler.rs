//! Story reconciler (upsert engine)
//!
//! Decides insert vs. update vs. no-op for a freshly fetched story. Only
//! `score` and `descendants` are compared; the other columns are written
//! once, on insert.

use hn_common::Story;
use std::fmt;
use tracing::{debug, info, warn};

use crate::error_log::ErrorLog;
use crate::models::FetchedStory;
use crate::store::{StoreResult, StoreTransaction, StoryStore};

/// Result of reconciling one story.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    Unchanged,
    Failed,
}

impl fmt::Display for UpsertOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UpsertOutcome::Inserted => "inserted",
            UpsertOutcome::Updated => "updated",
            UpsertOutcome::Unchanged => "unchanged",
            UpsertOutcome::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Write needed to bring the stored row in line with a fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    Insert(Story),
    Update {
        score: Option<i32>,
        descendants: Option<i32>,
    },
    Unchanged,
}

/// Pure decision step.
pub fn plan(existing: Option<&Story>, fetched: &FetchedStory) -> Plan {
    match existing {
        None => Plan::Insert(fetched.to_story()),
        Some(stored) if stored.counters_differ(fetched.score, fetched.descendants) => {
            Plan::Update {
                score: fetched.score,
                descendants: fetched.descendants,
            }
        },
        Some(_) => Plan::Unchanged,
    }
}

/// Upserts fetched stories through a run's store session.
pub struct Reconciler<'a, S: StoryStore + ?Sized> {
    store: &'a S,
    errors: &'a dyn ErrorLog,
}

impl<'a, S: StoryStore + ?Sized> Reconciler<'a, S> {
    pub fn new(store: &'a S, errors: &'a dyn ErrorLog) -> Self {
        Self { store, errors }
    }

    /// Reconcile one story. Persistence failures are rolled back, logged and
    /// reported as [`UpsertOutcome::Failed`].
    #[tracing::instrument(skip(self, fetched), fields(story_id = fetched.id))]
    pub async fn upsert(&self, fetched: &FetchedStory) -> UpsertOutcome {
        let mut tx = match self.store.begin().await {
            Ok(tx) => tx,
            Err(e) => return self.fail(fetched.id, e).await,
        };

        match apply(tx.as_mut(), fetched).await {
            Ok(UpsertOutcome::Unchanged) => {
                if let Err(e) = tx.rollback().await {
                    warn!(error = %e, "Releasing read-only transaction failed");
                }
                debug!("Story unchanged");
                UpsertOutcome::Unchanged
            },
            Ok(outcome) => match tx.commit().await {
                Ok(()) => outcome,
                Err(e) => self.fail(fetched.id, e).await,
            },
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "Rollback failed");
                }
                self.fail(fetched.id, e).await
            },
        }
    }

    async fn fail(&self, id: i64, error: impl fmt::Display) -> UpsertOutcome {
        let message = format!("Error inserting/updating story: {}", error);
        warn!(story_id = id, "{}", message);
        self.errors.log_error(Some(id), &message).await;
        UpsertOutcome::Failed
    }
}

async fn apply(
    tx: &mut dyn StoreTransaction,
    fetched: &FetchedStory,
) -> StoreResult<UpsertOutcome> {
    let existing = tx.find_story(fetched.id).await?;

    match plan(existing.as_ref(), fetched) {
        Plan::Insert(story) => {
            tx.insert_story(&story).await?;
            info!(score = ?story.score, "Inserted story {}", story.id);
            Ok(UpsertOutcome::Inserted)
        },
        Plan::Update { score, descendants } => {
            tx.update_counters(fetched.id, score, descendants).await?;
            info!(
                old_score = ?existing.as_ref().and_then(|s| s.score),
                new_score = ?score,
                "Updated story {}",
                fetched.id
            );
            Ok(UpsertOutcome::Updated)
        },
        Plan::Unchanged => Ok(UpsertOutcome::Unchanged),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error_log::RecordingErrorLog;
    use crate::store::{MemoryStore, StoreError};
    use async_trait::async_trait;

    fn fetched(id: i64, score: i32, descendants: i32) -> FetchedStory {
        FetchedStory {
            id,
            title: "Show HN: a thing".to_string(),
            score: Some(score),
            url: Some("https://example.com".to_string()),
            author: "pg".to_string(),
            time: Some(1_700_000_000),
            descendants: Some(descendants),
        }
    }

    #[test]
    fn test_plan() {
        let f = fetched(1, 10, 2);
        assert_eq!(plan(None, &f), Plan::Insert(f.to_story()));

        let stored = f.to_story();
        assert_eq!(plan(Some(&stored), &f), Plan::Unchanged);
        assert_eq!(
            plan(Some(&stored), &fetched(1, 15, 2)),
            Plan::Update {
                score: Some(15),
                descendants: Some(2)
            }
        );
    }

    #[test]
    fn test_plan_ignores_descriptive_drift() {
        let stored = fetched(1, 10, 2).to_story();
        let mut retitled = fetched(1, 10, 2);
        retitled.title = "Show HN: a thing (2023)".to_string();
        retitled.url = None;
        retitled.author = "someone".to_string();
        assert_eq!(plan(Some(&stored), &retitled), Plan::Unchanged);
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let store = MemoryStore::new();
        let errors = RecordingErrorLog::new();
        let reconciler = Reconciler::new(&store, &errors);
        let story = fetched(8863, 111, 71);

        assert_eq!(reconciler.upsert(&story).await, UpsertOutcome::Inserted);
        assert_eq!(reconciler.upsert(&story).await, UpsertOutcome::Unchanged);

        assert_eq!(store.stories().len(), 1);
        assert_eq!(store.story_writes(), 1);
        assert!(errors.is_empty());
    }

    #[tokio::test]
    async fn test_upsert_updates_counters_only() {
        let mut seeded = fetched(1, 10, 2).to_story();
        seeded.title = Some("Original title".to_string());
        let store = MemoryStore::with_stories([seeded]);
        let errors = RecordingErrorLog::new();
        let reconciler = Reconciler::new(&store, &errors);

        assert_eq!(reconciler.upsert(&fetched(1, 15, 2)).await, UpsertOutcome::Updated);
        let stored = store.story(1).unwrap();
        assert_eq!(stored.score, Some(15));
        assert_eq!(stored.descendants, Some(2));
        assert_eq!(stored.title.as_deref(), Some("Original title"));

        assert_eq!(reconciler.upsert(&fetched(1, 15, 2)).await, UpsertOutcome::Unchanged);
        assert_eq!(store.story_writes(), 1);
    }

    /// Store whose transactions cannot be opened.
    struct DownStore;

    #[async_trait]
    impl StoryStore for DownStore {
        async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
            Err(StoreError::Unavailable("connection reset".to_string()))
        }

        async fn close(&self) {}
    }

    #[tokio::test]
    async fn test_upsert_failure_is_logged() {
        let errors = RecordingErrorLog::new();
        let reconciler = Reconciler::new(&DownStore, &errors);

        assert_eq!(reconciler.upsert(&fetched(3, 1, 0)).await, UpsertOutcome::Failed);
        let records = errors.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].0, Some(3));
        assert!(records[0].1.starts_with("Error inserting/updating story:"));
        assert!(records[0].1.contains("connection reset"));
    }

    #[tokio::test]
    async fn test_commit_conflict_is_failed_not_duplicated() {
        let store = MemoryStore::new();
        let errors = RecordingErrorLog::new();
        let reconciler = Reconciler::new(&store, &errors);

        // A concurrent run inserts the same id between lookup and commit.
        let mut racing = store.begin().await.unwrap();
        racing.insert_story(&fetched(9, 1, 0).to_story()).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert_eq!(apply(tx.as_mut(), &fetched(9, 2, 0)).await.unwrap(), UpsertOutcome::Inserted);
        racing.commit().await.unwrap();
        assert!(matches!(tx.commit().await, Err(StoreError::Conflict(9))));

        assert_eq!(store.stories().len(), 1);
        assert_eq!(reconciler.upsert(&fetched(9, 2, 0)).await, UpsertOutcome::Updated);
        assert_eq!(store.story(9).unwrap().score, Some(2));
    }
}
