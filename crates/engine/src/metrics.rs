//! Registry counters
//!
//! All counters use Relaxed ordering: they are observational only and do not
//! synchronize any other memory.

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters owned by a registry
#[derive(Debug, Default)]
pub(crate) struct Counters {
    sets: AtomicU64,
    deletes: AtomicU64,
    broadcasts: AtomicU64,
    active_syncs: AtomicU64,
    batches_sent: AtomicU64,
    tombstones_purged: AtomicU64,
    reaper_passes: AtomicU64,
}

impl Counters {
    pub(crate) fn record_set(&self) {
        self.sets.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delete(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_broadcast(&self) {
        self.broadcasts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn sync_started(&self) {
        self.active_syncs.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn sync_finished(&self) {
        self.active_syncs.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn record_batch(&self) {
        self.batches_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_reap(&self, purged: usize) {
        self.tombstones_purged
            .fetch_add(purged as u64, Ordering::Relaxed);
        self.reaper_passes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, record_types: usize) -> RegistryMetrics {
        RegistryMetrics {
            record_types,
            sets: self.sets.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            broadcasts: self.broadcasts.load(Ordering::Relaxed),
            active_syncs: self.active_syncs.load(Ordering::Relaxed),
            batches_sent: self.batches_sent.load(Ordering::Relaxed),
            tombstones_purged: self.tombstones_purged.load(Ordering::Relaxed),
            reaper_passes: self.reaper_passes.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time registry metrics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryMetrics {
    /// Number of record types with a store
    pub record_types: usize,
    /// Successful sets
    pub sets: u64,
    /// Deletes that tombstoned a live record
    pub deletes: u64,
    /// Signal broadcasts issued
    pub broadcasts: u64,
    /// Sync loops currently running
    pub active_syncs: u64,
    /// Sync batches handed to watchers
    pub batches_sent: u64,
    /// Tombstones permanently removed
    pub tombstones_purged: u64,
    /// Completed reaper passes
    pub reaper_passes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_snapshot() {
        let counters = Counters::default();
        counters.record_set();
        counters.record_set();
        counters.record_delete();
        counters.sync_started();
        counters.sync_started();
        counters.sync_finished();
        counters.record_reap(3);

        let m = counters.snapshot(4);
        assert_eq!(m.record_types, 4);
        assert_eq!(m.sets, 2);
        assert_eq!(m.deletes, 1);
        assert_eq!(m.active_syncs, 1);
        assert_eq!(m.tombstones_purged, 3);
        assert_eq!(m.reaper_passes, 1);
    }
}
