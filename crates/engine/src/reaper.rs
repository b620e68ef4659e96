//! Tombstone reaper background task
//!
//! One reaper thread runs per registry. Every half retention window it purges,
//! in every known store, the tombstones deleted more than one retention window
//! ago. A tombstone therefore stays listable for at least the window and at
//! most 1.5x the window.
//!
//! # Design Notes
//!
//! - Runs on a plain thread; the registry does not need an async runtime
//! - Sleeps in short slices so shutdown is prompt even with long intervals
//! - Graceful shutdown via atomic flag, joined on registry drop

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::debug;

use databroker_core::{BrokerError, BrokerResult, Timestamp};

use crate::registry::Shared;

/// Longest single sleep between shutdown checks
const SHUTDOWN_POLL: Duration = Duration::from_millis(50);

/// Handle to the running reaper thread
pub struct TombstoneReaper {
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl TombstoneReaper {
    /// Spawn the reaper for `shared`
    pub(crate) fn start(shared: Arc<Shared>) -> BrokerResult<Self> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);
        let retention = shared.config.retention_window();
        let interval = shared.config.reap_interval();

        let handle = thread::Builder::new()
            .name("databroker-reaper".to_string())
            .spawn(move || reaper_loop(&shared, retention, interval, &flag))
            .map_err(|e| BrokerError::internal(format!("failed to spawn reaper thread: {}", e)))?;

        Ok(Self {
            shutdown,
            handle: Some(handle),
        })
    }

    /// Signal the thread to stop and wait for it
    pub fn shutdown(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    /// True while the thread is alive
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().map_or(false, |h| !h.is_finished())
    }
}

impl Drop for TombstoneReaper {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn reaper_loop(shared: &Shared, retention: Duration, interval: Duration, shutdown: &AtomicBool) {
    debug!(target: "databroker::reaper", ?interval, "Reaper started");
    let slice = SHUTDOWN_POLL.min(interval);

    loop {
        // Sleep first: nothing can be old enough right after startup
        let mut elapsed = Duration::ZERO;
        while elapsed < interval {
            if shutdown.load(Ordering::Acquire) {
                debug!(target: "databroker::reaper", "Reaper stopped");
                return;
            }
            thread::sleep(slice);
            elapsed += slice;
        }

        let cutoff = Timestamp::now().saturating_sub(retention);
        shared.reap(cutoff);
    }
}
