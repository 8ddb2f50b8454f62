//! hn-pulse Ingest Library
//!
//! ETL pipeline that pulls the Hacker News top-stories listing and per-item
//! details, and reconciles them into PostgreSQL.
//!
//! # Components
//!
//! - [`client`]: bounded-retry fetches of the id list and of single items
//! - [`error_log`]: best-effort failure log written alongside the run
//! - [`reconciler`]: insert / update / no-op decision per story
//! - [`orchestrator`]: one end-to-end pass with a scoped store session
//! - [`scheduler`]: fixed-interval runs
//!
//! # Example
//!
//! ```no_run
//! use hn_ingest::{db::DbConfig, EtlRunner, HnClient, IngestConfig, PgConnector};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = IngestConfig::from_env()?;
//!     let client = HnClient::new(&config)?;
//!     let runner = EtlRunner::new(config, client, PgConnector::new(DbConfig::from_env()?));
//!     let stats = runner.run_once().await?;
//!     println!("{}", stats);
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod client;
pub mod config;
pub mod db;
pub mod error_log;
pub mod models;
pub mod orchestrator;
pub mod reconciler;
pub mod scheduler;
pub mod store;

pub use client::{FetchError, HnClient};
pub use config::IngestConfig;
pub use error_log::{ErrorLog, RecordingErrorLog, StoreErrorLog, TracingErrorLog};
pub use models::FetchedStory;
pub use orchestrator::{run_pass, EtlError, EtlRunner, RunPhase, RunStats};
pub use reconciler::{Reconciler, UpsertOutcome};
pub use scheduler::EtlScheduler;
pub use store::{MemoryStore, PgConnector, PgStore, StoreConnector, StoryStore};
