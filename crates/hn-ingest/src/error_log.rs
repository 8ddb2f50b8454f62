//! Best-effort error log
//!
//! Fetch and persist failures are recorded through [`ErrorLog`] as a side
//! channel. Writing a record never fails the caller: the store-backed log
//! retries a few times on a fixed delay and then drops the record.

use async_trait::async_trait;
use tracing::{error, warn};

use crate::config::ErrorLogPolicy;
use crate::store::{StoreResult, StoryStore};

/// Sink for ETL failure diagnostics.
#[async_trait]
pub trait ErrorLog: Send + Sync {
    /// Record a failure. `story_id` is `None` for list-level failures.
    async fn log_error(&self, story_id: Option<i64>, message: &str);
}

/// Writes records to the `etl_errors` table of the run's store session.
pub struct StoreErrorLog<'a, S: StoryStore + ?Sized> {
    store: &'a S,
    policy: ErrorLogPolicy,
}

impl<'a, S: StoryStore + ?Sized> StoreErrorLog<'a, S> {
    pub fn new(store: &'a S, policy: ErrorLogPolicy) -> Self {
        Self { store, policy }
    }

    async fn write(&self, story_id: Option<i64>, message: &str) -> StoreResult<()> {
        let mut tx = self.store.begin().await?;
        match tx.insert_error(story_id, message).await {
            Ok(()) => tx.commit().await,
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "Rollback of error-log write failed");
                }
                Err(e)
            },
        }
    }
}

#[async_trait]
impl<'a, S: StoryStore + ?Sized> ErrorLog for StoreErrorLog<'a, S> {
    async fn log_error(&self, story_id: Option<i64>, message: &str) {
        let max = self.policy.max_retries;

        for attempt in 1..=max {
            match self.write(story_id, message).await {
                Ok(()) => return,
                Err(e) => {
                    warn!(
                        story_id = ?story_id,
                        "Error-log write attempt {}/{} failed: {}",
                        attempt,
                        max,
                        e
                    );
                    if attempt < max {
                        tokio::time::sleep(self.policy.retry_delay).await;
                    }
                },
            }
        }

        error!(
            story_id = ?story_id,
            record = %message,
            "Failed to log error after {} attempts; record dropped",
            max
        );
    }
}

/// Emits records to the trace only. Used when no store is attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingErrorLog;

#[async_trait]
impl ErrorLog for TracingErrorLog {
    async fn log_error(&self, story_id: Option<i64>, message: &str) {
        warn!(story_id = ?story_id, "{}", message);
    }
}

/// Keeps records in memory so callers can assert on them.
#[derive(Debug, Default)]
pub struct RecordingErrorLog {
    records: std::sync::Mutex<Vec<(Option<i64>, String)>>,
}

impl RecordingErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<(Option<i64>, String)> {
        self.records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ErrorLog for RecordingErrorLog {
    async fn log_error(&self, story_id: Option<i64>, message: &str) {
        self.records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push((story_id, message.to_string()));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, StoreError, StoreTransaction};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Store whose first `failures` error-log writes fail.
    struct FlakyStore {
        inner: MemoryStore,
        failures: usize,
        attempts: AtomicUsize,
        rollbacks: std::sync::Arc<AtomicUsize>,
    }

    impl FlakyStore {
        fn new(failures: usize) -> Self {
            Self {
                inner: MemoryStore::new(),
                failures,
                attempts: AtomicUsize::new(0),
                rollbacks: std::sync::Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    struct FlakyTransaction {
        inner: Box<dyn StoreTransaction>,
        fail: bool,
        rollbacks: std::sync::Arc<AtomicUsize>,
    }

    #[async_trait]
    impl StoryStore for FlakyStore {
        async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FlakyTransaction {
                inner: self.inner.begin().await?,
                fail: attempt < self.failures,
                rollbacks: self.rollbacks.clone(),
            }))
        }

        async fn close(&self) {
            self.inner.close().await;
        }
    }

    #[async_trait]
    impl StoreTransaction for FlakyTransaction {
        async fn find_story(&mut self, id: i64) -> StoreResult<Option<hn_common::Story>> {
            self.inner.find_story(id).await
        }

        async fn insert_story(&mut self, story: &hn_common::Story) -> StoreResult<()> {
            self.inner.insert_story(story).await
        }

        async fn update_counters(
            &mut self,
            id: i64,
            score: Option<i32>,
            descendants: Option<i32>,
        ) -> StoreResult<()> {
            self.inner.update_counters(id, score, descendants).await
        }

        async fn insert_error(&mut self, story_id: Option<i64>, message: &str) -> StoreResult<()> {
            if self.fail {
                return Err(StoreError::Unavailable("etl_errors locked".to_string()));
            }
            self.inner.insert_error(story_id, message).await
        }

        async fn commit(self: Box<Self>) -> StoreResult<()> {
            self.inner.commit().await
        }

        async fn rollback(self: Box<Self>) -> StoreResult<()> {
            self.rollbacks.fetch_add(1, Ordering::SeqCst);
            self.inner.rollback().await
        }
    }

    fn policy() -> ErrorLogPolicy {
        ErrorLogPolicy {
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn test_store_error_log_writes_record() {
        let store = MemoryStore::new();
        StoreErrorLog::new(&store, policy())
            .log_error(Some(42), "boom")
            .await;

        let errors = store.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].story_id, Some(42));
        assert_eq!(errors[0].error_message, "boom");
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_error_log_retries_then_succeeds() {
        let store = FlakyStore::new(2);
        let started = tokio::time::Instant::now();

        StoreErrorLog::new(&store, policy())
            .log_error(None, "list fetch failed")
            .await;

        assert_eq!(store.attempts.load(Ordering::SeqCst), 3);
        assert_eq!(store.rollbacks.load(Ordering::SeqCst), 2);
        assert_eq!(store.inner.errors().len(), 1);
        assert_eq!(started.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_error_log_drops_after_exhaustion() {
        let store = FlakyStore::new(usize::MAX);
        let started = tokio::time::Instant::now();

        StoreErrorLog::new(&store, policy())
            .log_error(Some(7), "never stored")
            .await;

        assert_eq!(store.attempts.load(Ordering::SeqCst), 3);
        assert_eq!(store.rollbacks.load(Ordering::SeqCst), 3);
        assert!(store.inner.errors().is_empty());
        // Fixed delay between attempts only, no growth.
        assert_eq!(started.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_recording_error_log() {
        let log = RecordingErrorLog::new();
        assert!(log.is_empty());
        log.log_error(Some(1), "a").await;
        log.log_error(None, "b").await;
        assert_eq!(
            log.records(),
            vec![(Some(1), "a".to_string()), (None, "b".to_string())]
        );
    }
}
