//! Registry: record type → store, plus the shared change signal
//!
//! The registry is the broker's entry point. It owns:
//! - the server instance id, generated once per registry lifetime
//! - one [`RecordStore`] per record type, created on first reference and
//!   never removed
//! - the [`Signal`] that wakes every sync loop after a mutation
//! - the background [`TombstoneReaper`]
//!
//! # Locking
//!
//! The type map sits behind one `RwLock`. Lookups take the read path; on a
//! miss the write lock is taken and the map is checked again before a store
//! is created, so concurrent first access never yields two stores for one
//! type. Store operations happen after the map lock is released.
//!
//! Every committed mutation broadcasts on the signal after the store's write
//! lock is released, so a woken watcher always sees the new version.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use tracing::{debug, info};

use databroker_core::{BrokerError, BrokerResult, InstanceId, Record, Timestamp, Version};
use databroker_storage::RecordStore;

use crate::config::BrokerConfig;
use crate::metrics::{Counters, RegistryMetrics};
use crate::reaper::TombstoneReaper;
use crate::signal::Signal;

/// State shared between the registry handle, sync loops and the reaper
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) instance_id: InstanceId,
    pub(crate) config: BrokerConfig,
    stores: RwLock<FxHashMap<String, Arc<RecordStore>>>,
    pub(crate) signal: Arc<Signal>,
    pub(crate) counters: Counters,
}

impl Shared {
    /// Store for `record_type`, created on first use
    pub(crate) fn store(&self, record_type: &str) -> Arc<RecordStore> {
        // double-checked: read lock first, then re-check under the write lock
        {
            let stores = self.stores.read();
            if let Some(store) = stores.get(record_type) {
                return Arc::clone(store);
            }
        }

        let mut stores = self.stores.write();
        if let Some(store) = stores.get(record_type) {
            return Arc::clone(store);
        }
        let store = Arc::new(RecordStore::new(record_type, self.config.ordering_fanout));
        stores.insert(record_type.to_string(), Arc::clone(&store));
        debug!(target: "databroker::registry", record_type, "Created record store");
        store
    }

    /// Snapshot of all stores, taken under the read lock
    fn all_stores(&self) -> Vec<Arc<RecordStore>> {
        self.stores.read().values().cloned().collect()
    }

    fn notify(&self) {
        self.signal.broadcast();
        self.counters.record_broadcast();
    }

    /// One reaper pass: purge tombstones deleted before `cutoff` in every store
    pub(crate) fn reap(&self, cutoff: Timestamp) -> usize {
        // The map lock is released before any store is touched.
        let stores = self.all_stores();
        let purged: usize = stores.iter().map(|store| store.clear_deleted(cutoff)).sum();
        self.counters.record_reap(purged);
        if purged > 0 {
            info!(
                target: "databroker::reaper",
                purged,
                record_types = stores.len(),
                cutoff = %cutoff,
                "Purged tombstones"
            );
        }
        purged
    }
}

/// All live records of one type plus the watermark they correspond to
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Instance id of the registry that produced the snapshot
    pub server_version: InstanceId,
    /// Store watermark; sync from here to continue
    pub record_version: Version,
    /// Live records, ascending by version
    pub records: Vec<Record>,
}

/// In-memory, versioned record registry
///
/// # Example
///
/// ```ignore
/// let registry = Registry::new(BrokerConfig::default())?;
/// let record = registry.set("session", "abc", b"payload".to_vec());
/// assert_eq!(registry.get("session", "abc")?.version, record.version);
/// ```
pub struct Registry {
    pub(crate) shared: Arc<Shared>,
    reaper: Mutex<Option<TombstoneReaper>>,
}

impl Registry {
    /// Create a registry and start its tombstone reaper
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for an invalid config and `Internal` if the
    /// reaper thread cannot be spawned.
    pub fn new(config: BrokerConfig) -> BrokerResult<Self> {
        config.validate()?;
        let shared = Arc::new(Shared {
            instance_id: InstanceId::generate(),
            config,
            stores: RwLock::new(FxHashMap::default()),
            signal: Signal::new(),
            counters: Counters::default(),
        });
        let reaper = TombstoneReaper::start(Arc::clone(&shared))?;

        info!(
            target: "databroker::registry",
            server_version = %shared.instance_id,
            retention_window = ?shared.config.retention_window(),
            "Registry started"
        );

        Ok(Self {
            shared,
            reaper: Mutex::new(Some(reaper)),
        })
    }

    /// Instance id sent to watchers with every batch
    pub fn server_version(&self) -> InstanceId {
        self.shared.instance_id
    }

    /// Active configuration
    pub fn config(&self) -> &BrokerConfig {
        &self.shared.config
    }

    /// Get the live record for `(record_type, id)`
    ///
    /// # Errors
    ///
    /// `NotFound` if the id was never set or is currently deleted.
    pub fn get(&self, record_type: &str, id: &str) -> BrokerResult<Record> {
        self.shared
            .store(record_type)
            .get(id)
            .ok_or_else(|| BrokerError::not_found(record_type, id))
    }

    /// All live records of a type with the matching watermark
    pub fn get_all(&self, record_type: &str) -> Snapshot {
        let (records, record_version) = self.shared.store(record_type).live_records();
        Snapshot {
            server_version: self.shared.instance_id,
            record_version,
            records,
        }
    }

    /// Insert or replace a record; returns it with its new version
    pub fn set(&self, record_type: &str, id: &str, data: impl Into<Vec<u8>>) -> Record {
        let record = self.shared.store(record_type).set(id, data.into());
        self.shared.counters.record_set();
        self.shared.notify();
        record
    }

    /// Delete a record
    ///
    /// Idempotent: deleting a missing or already deleted id changes nothing,
    /// broadcasts nothing and returns `None`. Otherwise returns the tombstone.
    pub fn delete(&self, record_type: &str, id: &str) -> Option<Record> {
        let tombstone = self.shared.store(record_type).delete(id)?;
        self.shared.counters.record_delete();
        self.shared.notify();
        Some(tombstone)
    }

    /// Known record types, sorted
    pub fn record_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.shared.stores.read().keys().cloned().collect();
        types.sort();
        types
    }

    /// Run one reaper pass now, purging tombstones deleted before `cutoff`
    ///
    /// Returns the number of tombstones removed.
    pub fn reap(&self, cutoff: Timestamp) -> usize {
        self.shared.reap(cutoff)
    }

    /// Current counters
    pub fn metrics(&self) -> RegistryMetrics {
        let record_types = self.shared.stores.read().len();
        self.shared.counters.snapshot(record_types)
    }

    /// Stop the background reaper and wait for it to exit
    ///
    /// Reads, writes and syncs keep working; only purging stops.
    pub fn shutdown(&self) {
        if let Some(mut reaper) = self.reaper.lock().take() {
            reaper.shutdown();
        }
    }

    /// True while the background reaper is running
    pub fn is_reaper_running(&self) -> bool {
        self.reaper
            .lock()
            .as_ref()
            .map_or(false, TombstoneReaper::is_running)
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("server_version", &self.shared.instance_id)
            .field("record_types", &self.record_types())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn registry() -> Registry {
        Registry::new(BrokerConfig::default()).unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = Registry::new(BrokerConfig::default().with_ordering_fanout(0)).unwrap_err();
        assert!(matches!(err, BrokerError::InvalidInput(_)));
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let registry = registry();
        let err = registry.get("session", "nope").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_set_get_delete() {
        let registry = registry();
        let written = registry.set("session", "a", b"x".to_vec());
        assert_eq!(registry.get("session", "a").unwrap(), written);

        let tomb = registry.delete("session", "a").unwrap();
        assert!(tomb.version > written.version);
        assert!(registry.get("session", "a").unwrap_err().is_not_found());
        assert!(registry.delete("session", "a").is_none());
    }

    #[test]
    fn test_types_are_isolated() {
        let registry = registry();
        registry.set("session", "a", b"s".to_vec());
        registry.set("config", "a", b"c".to_vec());

        assert_eq!(registry.get("session", "a").unwrap().data, b"s");
        assert_eq!(registry.get("config", "a").unwrap().data, b"c");
        assert_eq!(registry.record_types(), vec!["config", "session"]);
    }

    #[test]
    fn test_mutations_broadcast_only_on_change() {
        let registry = registry();
        registry.set("session", "a", vec![]);
        registry.delete("session", "a");
        registry.delete("session", "a");
        registry.delete("session", "never");

        assert_eq!(registry.shared.signal.generation(), 2);
        let m = registry.metrics();
        assert_eq!((m.sets, m.deletes, m.broadcasts), (1, 1, 2));
    }

    #[test]
    fn test_get_all_skips_tombstones() {
        let registry = registry();
        registry.set("session", "a", vec![]);
        registry.set("session", "b", vec![]);
        let tomb = registry.delete("session", "a").unwrap();

        let snapshot = registry.get_all("session");
        assert_eq!(snapshot.server_version, registry.server_version());
        assert_eq!(snapshot.record_version, tomb.version);
        assert_eq!(snapshot.records.len(), 1);
        assert_eq!(snapshot.records[0].id, "b");
    }

    #[test]
    fn test_concurrent_first_access_creates_one_store() {
        let registry = Arc::new(registry());
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    registry.set("session", &format!("id-{}", i), vec![]);
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(registry.record_types(), vec!["session"]);
        assert_eq!(registry.get_all("session").records.len(), 16);
        assert_eq!(
            registry.get_all("session").record_version,
            Version::new(16)
        );
    }

    #[test]
    fn test_reap_purges_across_types() {
        let registry = registry();
        for record_type in ["session", "config"] {
            registry.set(record_type, "a", vec![]);
            registry.delete(record_type, "a");
        }
        registry.set("session", "live", vec![]);

        assert_eq!(registry.reap(Timestamp::MAX), 2);
        assert_eq!(registry.shared.store("session").list(Version::ZERO).len(), 1);
        assert!(registry.shared.store("config").is_empty());
        assert_eq!(registry.metrics().tombstones_purged, 2);
    }

    #[test]
    fn test_shutdown_stops_reaper() {
        let registry = registry();
        assert!(registry.is_reaper_running());
        registry.shutdown();
        assert!(!registry.is_reaper_running());
        // Idempotent
        registry.shutdown();
    }

    #[test]
    fn test_restart_gets_new_server_version() {
        let first = registry();
        let second = registry();
        assert_ne!(first.server_version(), second.server_version());
    }
}
