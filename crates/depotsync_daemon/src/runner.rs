//! The poll loop.

use depotsync_engine::{RecordStore, StoreClient, SyncEngine};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Granularity of the inter-cycle sleep, so shutdown is noticed promptly.
const SLEEP_SLICE: Duration = Duration::from_millis(250);

/// Cooperative shutdown signal shared between the signal handler and the
/// poll loop.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag {
    requested: Arc<AtomicBool>,
}

impl ShutdownFlag {
    /// Creates a new, unset flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests shutdown after the current cycle or sleep.
    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    /// Returns true once shutdown has been requested.
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

/// Runs sync cycles until shutdown is requested.
///
/// Each cycle runs to completion; the flag is only honored between
/// cycles and during the inter-cycle sleep, never mid-row. A failed
/// cycle is logged and the loop proceeds to the next interval.
pub fn run_loop<S, R>(engine: &SyncEngine<S, R>, poll_interval: Duration, flag: &ShutdownFlag)
where
    S: StoreClient,
    R: RecordStore,
{
    while !flag.is_requested() {
        match engine.run_cycle() {
            Ok(report) => {
                info!(
                    rows = report.rows,
                    converged = report.converged,
                    updated = report.updated,
                    failed = report.failed,
                    duration_ms = report.duration.as_millis() as u64,
                    "cycle complete"
                );
            }
            Err(err) => {
                error!(error = %err, "sync cycle failed");
            }
        }

        sleep_interruptible(poll_interval, flag);
    }

    info!("shutdown requested, exiting");
}

fn sleep_interruptible(total: Duration, flag: &ShutdownFlag) {
    let mut remaining = total;
    while !remaining.is_zero() && !flag.is_requested() {
        let slice = remaining.min(SLEEP_SLICE);
        std::thread::sleep(slice);
        remaining = remaining.saturating_sub(slice);
    }
}
