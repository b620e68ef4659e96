//! Sync: the change feed for one record type
//!
//! A sync call streams every record of a type newer than the caller's
//! watermark, then keeps the stream open and pushes further changes as they
//! are committed. Tombstones are included so watchers can apply deletes.
//!
//! # Protocol
//!
//! 1. If the caller's server version is not this registry's instance id, its
//!    record version refers to history that no longer exists: start over
//!    from `Version::ZERO`.
//! 2. Bind a waiter on the shared signal.
//! 3. Loop: list the store since the watermark; if anything came back, send
//!    it as one batch. Either way advance the watermark to the store's last
//!    version, read under the same lock as the listing. Then
//!    wait for the next broadcast, the caller going away, or the deadline.
//! 4. The waiter unbinds on every exit path (it is dropped).
//!
//! Before every list, a watermark below the store's purge watermark is reset
//! to `ZERO`: a tombstone the caller never saw has been purged, so only a
//! full resend is safe. Batches listed from `ZERO` carry `reset = true`,
//! telling the consumer to replace its view of the type.
//!
//! No lock is held while a batch is sent.

use std::future::pending;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};

use databroker_core::{BrokerError, BrokerResult, InstanceId, Record, Version};

use crate::metrics::Counters;
use crate::registry::{Registry, Shared};

/// Buffered batches per watch stream
pub const SYNC_CHANNEL_CAPACITY: usize = 16;

/// Parameters of a sync call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRequest {
    /// Record type to follow
    pub record_type: String,
    /// Registry instance id the caller last saw, if any
    pub server_version: Option<InstanceId>,
    /// Last version the caller fully applied
    pub record_version: Version,
    /// Give up with `DeadlineExceeded` after this long
    pub deadline: Option<Duration>,
}

impl SyncRequest {
    /// Follow `record_type` from the beginning
    pub fn new(record_type: impl Into<String>) -> Self {
        Self {
            record_type: record_type.into(),
            server_version: None,
            record_version: Version::ZERO,
            deadline: None,
        }
    }

    /// Resume from a previously seen server and record version
    pub fn resume_from(mut self, server_version: InstanceId, record_version: Version) -> Self {
        self.server_version = Some(server_version);
        self.record_version = record_version;
        self
    }

    /// Bound the call's lifetime
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// One pushed batch of changes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncBatch {
    /// Record type the batch was listed from
    pub record_type: String,
    /// Instance id of the sending registry
    pub server_version: InstanceId,
    /// Changed records (live and tombstone), ascending by version
    pub records: Vec<Record>,
    /// Watermark to resume from once this batch is applied
    ///
    /// May be past the last record when purged tombstones trail it.
    pub record_version: Version,
    /// Listed from the beginning: replace the consumer's view of the type
    pub reset: bool,
}

struct ActiveSync<'a>(&'a Counters);

impl<'a> ActiveSync<'a> {
    fn enter(counters: &'a Counters) -> Self {
        counters.sync_started();
        ActiveSync(counters)
    }
}

impl Drop for ActiveSync<'_> {
    fn drop(&mut self) {
        self.0.sync_finished();
    }
}

impl Shared {
    pub(crate) async fn sync(
        &self,
        request: SyncRequest,
        sink: mpsc::Sender<SyncBatch>,
    ) -> BrokerResult<()> {
        debug!(
            target: "databroker::sync",
            record_type = %request.record_type,
            record_version = %request.record_version,
            "Sync started"
        );
        let result = self.sync_loop(&request, &sink).await;
        match &result {
            Err(e) if e.is_cancellation() => {
                debug!(target: "databroker::sync", record_type = %request.record_type, reason = %e, "Sync ended");
            }
            Err(e) => {
                warn!(target: "databroker::sync", record_type = %request.record_type, error = %e, "Sync failed");
            }
            Ok(()) => {}
        }
        result
    }

    async fn sync_loop(
        &self,
        request: &SyncRequest,
        sink: &mpsc::Sender<SyncBatch>,
    ) -> BrokerResult<()> {
        let mut watermark = request.record_version;
        // Set when the caller's view must be discarded even if nothing is listed
        let mut force_reset = false;
        if request.server_version != Some(self.instance_id) && !watermark.is_zero() {
            debug!(
                target: "databroker::sync",
                record_type = %request.record_type,
                "Server version changed, resending everything"
            );
            watermark = Version::ZERO;
            force_reset = true;
        }

        let store = self.store(&request.record_type);
        let mut waiter = self.signal.bind();
        let _active = ActiveSync::enter(&self.counters);

        let deadline = request.deadline.map(|d| Instant::now() + d);
        let expired = async move {
            match deadline {
                Some(at) => sleep_until(at).await,
                None => pending::<()>().await,
            }
        };
        tokio::pin!(expired);

        loop {
            let changes = store.changes(watermark);
            if changes.reset && !watermark.is_zero() {
                debug!(
                    target: "databroker::sync",
                    record_type = %request.record_type,
                    watermark = %watermark,
                    purged_through = %store.purged_through(),
                    "Watermark predates purged tombstones, resending everything"
                );
                force_reset = true;
            }

            if !changes.records.is_empty() || force_reset {
                let batch = SyncBatch {
                    record_type: request.record_type.clone(),
                    server_version: self.instance_id,
                    records: changes.records,
                    record_version: changes.watermark,
                    reset: changes.reset,
                };
                tokio::select! {
                    sent = sink.send(batch) => sent.map_err(|_| BrokerError::Cancelled)?,
                    _ = &mut expired => return Err(BrokerError::DeadlineExceeded),
                }
                force_reset = false;
                self.counters.record_batch();
            }
            watermark = changes.watermark;

            tokio::select! {
                _ = sink.closed() => return Err(BrokerError::Cancelled),
                _ = &mut expired => return Err(BrokerError::DeadlineExceeded),
                _ = waiter.wait() => {}
            }
        }
    }
}

/// Receiving end of a spawned sync loop
///
/// Dropping the stream cancels the loop.
#[derive(Debug)]
pub struct SyncStream {
    receiver: mpsc::Receiver<SyncBatch>,
    task: JoinHandle<BrokerResult<()>>,
}

impl SyncStream {
    /// Next batch, or `None` once the loop has ended
    pub async fn next(&mut self) -> Option<SyncBatch> {
        self.receiver.recv().await
    }

    /// Cancel the loop and wait for it to finish
    ///
    /// Cancellation is the expected outcome and maps to `Ok(())`; any other
    /// way the loop ended is returned as the error.
    pub async fn close(self) -> BrokerResult<()> {
        let SyncStream { receiver, task } = self;
        drop(receiver);
        match task.await {
            Ok(Err(BrokerError::Cancelled)) | Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e),
            Err(e) => Err(BrokerError::internal(format!("sync task failed: {}", e))),
        }
    }
}

impl Registry {
    /// Run the sync loop for `request`, pushing batches into `sink`
    ///
    /// Runs until the receiving side of `sink` is dropped (`Cancelled`) or the
    /// request deadline passes (`DeadlineExceeded`).
    pub async fn sync(
        &self,
        request: SyncRequest,
        sink: mpsc::Sender<SyncBatch>,
    ) -> BrokerResult<()> {
        self.shared.sync(request, sink).await
    }

    /// Spawn the sync loop on the current tokio runtime
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn watch(&self, request: SyncRequest) -> SyncStream {
        let (sender, receiver) = mpsc::channel(SYNC_CHANNEL_CAPACITY);
        let shared = Arc::clone(&self.shared);
        let task = tokio::spawn(async move { shared.sync(request, sender).await });
        SyncStream { receiver, task }
    }
}
