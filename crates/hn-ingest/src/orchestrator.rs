//! ETL run orchestrator
//!
//! One run walks `Start -> ListFetched -> ItemsProcessed -> Done`: open a
//! store session, fetch the top ids, cut them to the working set, fetch and
//! reconcile each id in order, then close the session. Only failing to open
//! the session aborts a run; item-level failures are logged and skipped.

use futures::FutureExt;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info};

use crate::client::HnClient;
use crate::config::IngestConfig;
use crate::error_log::{ErrorLog, StoreErrorLog};
use crate::reconciler::{Reconciler, UpsertOutcome};
use crate::store::{StoreConnector, StoreError, StoryStore};

/// Run-level failure. Nothing past session acquisition is fatal.
#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Failed to open store session: {0}")]
    Connect(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Start,
    ListFetched,
    ItemsProcessed,
    Done,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunPhase::Start => "start",
            RunPhase::ListFetched => "list_fetched",
            RunPhase::ItemsProcessed => "items_processed",
            RunPhase::Done => "done",
        };
        f.write_str(s)
    }
}

/// Counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Ids returned by the list endpoint.
    pub listed: usize,
    /// Ids kept after truncation.
    pub working_set: usize,
    pub fetched: usize,
    /// Absent items: exhausted retries, missing or not a story.
    pub skipped: usize,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
}

impl RunStats {
    fn record(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Inserted => self.inserted += 1,
            UpsertOutcome::Updated => self.updated += 1,
            UpsertOutcome::Unchanged => self.unchanged += 1,
            UpsertOutcome::Failed => self.failed += 1,
        }
    }
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "listed={} working_set={} fetched={} skipped={} inserted={} updated={} unchanged={} failed={}",
            self.listed,
            self.working_set,
            self.fetched,
            self.skipped,
            self.inserted,
            self.updated,
            self.unchanged,
            self.failed
        )
    }
}

/// Process one pass against an already-open session.
///
/// Does not close `store`; the caller owns the session.
pub async fn run_pass<S: StoryStore + ?Sized>(
    client: &HnClient,
    store: &S,
    errors: &dyn ErrorLog,
    working_set_size: usize,
) -> RunStats {
    let mut stats = RunStats::default();

    let ids = client.fetch_top_ids(errors).await;
    stats.listed = ids.len();
    let working_set = &ids[..ids.len().min(working_set_size)];
    stats.working_set = working_set.len();
    info!(
        phase = %RunPhase::ListFetched,
        listed = stats.listed,
        working_set = stats.working_set,
        "Fetched top stories"
    );

    let reconciler = Reconciler::new(store, errors);
    for &id in working_set {
        match client.fetch_item(id, errors).await {
            Some(story) => {
                stats.fetched += 1;
                stats.record(reconciler.upsert(&story).await);
            },
            None => {
                debug!(story_id = id, "No story fetched; skipping");
                stats.skipped += 1;
            },
        }
    }

    info!(phase = %RunPhase::ItemsProcessed, "Processed {} items", stats.working_set);
    stats
}

/// Drives scheduled or one-off ETL runs.
pub struct EtlRunner<C: StoreConnector> {
    config: IngestConfig,
    client: HnClient,
    connector: C,
}

impl<C: StoreConnector> EtlRunner<C> {
    pub fn new(config: IngestConfig, client: HnClient, connector: C) -> Self {
        Self {
            config,
            client,
            connector,
        }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Execute one run. The session is closed exactly once on every path
    /// past acquisition; a panic in the item loop is resumed after closing.
    pub async fn run_once(&self) -> Result<RunStats, EtlError> {
        let started = Instant::now();
        info!(phase = %RunPhase::Start, "Starting ETL run");

        let store = self.connector.connect().await?;
        let errors = StoreErrorLog::new(&store, self.config.error_log);

        let outcome = AssertUnwindSafe(run_pass(
            &self.client,
            &store,
            &errors,
            self.config.working_set_size,
        ))
        .catch_unwind()
        .await;

        store.close().await;

        match outcome {
            Ok(stats) => {
                info!(
                    phase = %RunPhase::Done,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "ETL run finished: {}",
                    stats
                );
                Ok(stats)
            },
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_record_outcomes() {
        let mut stats = RunStats::default();
        for outcome in [
            UpsertOutcome::Inserted,
            UpsertOutcome::Inserted,
            UpsertOutcome::Updated,
            UpsertOutcome::Unchanged,
            UpsertOutcome::Failed,
        ] {
            stats.record(outcome);
        }
        assert_eq!(stats.inserted, 2);
        assert_eq!(stats.updated, 1);
        assert_eq!(stats.unchanged, 1);
        assert_eq!(stats.failed, 1);
        assert!(stats.to_string().contains("inserted=2"));
    }

    #[test]
    fn test_phase_display() {
        let phases = [
            RunPhase::Start,
            RunPhase::ListFetched,
            RunPhase::ItemsProcessed,
            RunPhase::Done,
        ];
        let names: Vec<String> = phases.iter().map(ToString::to_string).collect();
        assert_eq!(names, ["start", "list_fetched", "items_processed", "done"]);
    }
}
