//! hn-ingest - Hacker News top-stories ETL

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hn_common::logging::{init_logging, LogConfig, LogLevel};
use hn_ingest::db::{self, DbConfig};
use hn_ingest::{EtlRunner, EtlScheduler, HnClient, IngestConfig, MemoryStore, PgConnector};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "hn-ingest")]
#[command(author, version, about = "Hacker News top-stories ETL")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a single ETL pass
    Run {
        /// Reconcile into an in-memory store instead of PostgreSQL
        #[arg(long)]
        dry_run: bool,
    },

    /// Run the ETL now and then on a fixed interval until Ctrl+C
    Schedule {
        /// Seconds between runs (defaults to ETL_INTERVAL_SECS)
        #[arg(long)]
        interval_secs: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    // Environment variables take precedence over the flag.
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("hn-ingest")
        .build()
        .merge_env()?;
    let _log_guard = init_logging(&log_config)?;

    let config = IngestConfig::from_env().context("Failed to load ingest configuration")?;
    let client = HnClient::new(&config)?;

    match cli.command {
        Command::Run { dry_run: true } => {
            let store = MemoryStore::new();
            let runner = EtlRunner::new(config, client, store.clone());
            let stats = runner.run_once().await?;
            info!(
                stories = store.stories().len(),
                errors = store.errors().len(),
                "Dry run complete: {}",
                stats
            );
        },
        Command::Run { dry_run: false } => {
            let runner = EtlRunner::new(config, client, pg_connector().await?);
            runner.run_once().await?;
        },
        Command::Schedule { interval_secs } => {
            let interval = interval_secs
                .map(Duration::from_secs)
                .unwrap_or(config.interval);
            anyhow::ensure!(!interval.is_zero(), "--interval-secs must be greater than 0");

            let runner = Arc::new(EtlRunner::new(config, client, pg_connector().await?));
            let shutdown = CancellationToken::new();
            let handle = EtlScheduler::new(runner, interval, shutdown.clone()).start();

            tokio::signal::ctrl_c()
                .await
                .context("Failed to install Ctrl+C handler")?;
            info!("Shutdown signal received, waiting for the current run to finish");
            shutdown.cancel();
            handle.await.context("ETL scheduler task failed")?;
        },
    }

    Ok(())
}

/// Apply migrations once, then hand out per-run pools.
async fn pg_connector() -> Result<PgConnector> {
    let db_config = DbConfig::from_env()?;

    let pool = db::create_pool(&db_config).await?;
    db::run_migrations(&pool).await?;
    pool.close().await;

    Ok(PgConnector::new(db_config))
}
