//! Interval scheduler
//!
//! Runs the ETL immediately and then on a fixed interval. A run that outlasts
//! the interval delays the next tick rather than bursting to catch up.
//! Cancelling the shutdown token stops the schedule between runs; a run in
//! progress finishes and closes its session first.

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::orchestrator::EtlRunner;
use crate::store::StoreConnector;

pub struct EtlScheduler<C: StoreConnector> {
    runner: Arc<EtlRunner<C>>,
    interval: Duration,
    shutdown: CancellationToken,
}

impl<C: StoreConnector + 'static> EtlScheduler<C> {
    pub fn new(runner: Arc<EtlRunner<C>>, interval: Duration, shutdown: CancellationToken) -> Self {
        Self {
            runner,
            interval,
            shutdown,
        }
    }

    /// Run until the shutdown token is cancelled. Failed and panicking runs
    /// are logged and the schedule continues.
    pub async fn run(self) {
        info!(interval_secs = self.interval.as_secs(), "ETL scheduler started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                _ = ticker.tick() => {},
            }

            match AssertUnwindSafe(self.runner.run_once()).catch_unwind().await {
                Ok(Ok(_)) => {},
                Ok(Err(e)) => error!("ETL run failed: {}", e),
                Err(panic) => error!("ETL run panicked: {}", panic_message(panic.as_ref())),
            }
        }

        info!("ETL scheduler stopped");
    }

    /// Spawn the schedule onto the runtime.
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
