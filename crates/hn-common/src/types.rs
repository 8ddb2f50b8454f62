//! Persisted record shapes shared by the ingest pipeline and the read API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Title stored when the remote item has none.
pub const DEFAULT_TITLE: &str = "No Title";

/// Author stored when the remote item has no `by` field.
pub const DEFAULT_AUTHOR: &str = "Unknown";

/// A story row (maps to the `stories` table).
///
/// `id` is assigned by the remote source and never changes. Only `score` and
/// `descendants` are rewritten after the row is first inserted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Story {
    pub id: i64,
    pub title: Option<String>,
    pub score: Option<i32>,
    pub url: Option<String>,
    pub author: Option<String>,
    pub time: Option<i64>,
    pub descendants: Option<i32>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

impl Story {
    /// Whether the mutable counters differ from `score`/`descendants`.
    pub fn counters_differ(&self, score: Option<i32>, descendants: Option<i32>) -> bool {
        self.score != score || self.descendants != descendants
    }

    /// Creation time formatted as `YYYY-MM-DD HH:MM:SS` (UTC).
    pub fn readable_time(&self) -> Option<String> {
        let secs = self.time.filter(|t| *t != 0)?;
        DateTime::<Utc>::from_timestamp(secs, 0).map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
    }
}

/// A logged ETL failure (maps to the `etl_errors` table). Write-once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub id: i64,
    /// Story the failure concerns; `None` for list-level failures.
    pub story_id: Option<i64>,
    pub error_message: String,
    pub created_at: DateTime<Utc>,
}
