//! RecordStore: versioned storage for the records of one type
//!
//! This module implements the per-type store using:
//! - `FxHashMap<String, Record>` for O(1) get-by-id
//! - `BTreeMap<Version, String>` ordering every row by version, so
//!   "records newer than V" is a range scan, not a full scan
//! - `TombstoneIndex` for purging old deletes in O(purged count)
//! - `parking_lot::RwLock` around all of the above
//!
//! # Design Notes
//!
//! - **Version allocation under the write lock**: the counter is advanced in
//!   the same critical section that inserts the row. A reader can never see
//!   version N+1 without N, which is what makes `list(since)` gap-free.
//! - **Soft deletes**: `delete()` keeps the row with `deleted_at` set and a new
//!   version, so watchers learn about the delete. Only `clear_deleted()`
//!   removes rows.
//! - **Purge watermark**: the store remembers the highest version it has ever
//!   purged. A watcher whose watermark is below it may have missed a delete
//!   and must resync from scratch.

use std::collections::BTreeMap;
use std::ops::Bound;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::debug;

use databroker_core::{Record, Timestamp, Version};

use crate::tombstones::TombstoneIndex;

/// Default size hint for the id index
pub const DEFAULT_ORDERING_FANOUT: usize = 8;

#[derive(Debug)]
struct StoreInner {
    /// Every row (live and tombstone) by id
    by_id: FxHashMap<String, Record>,
    /// Every row's current version → id
    by_version: BTreeMap<Version, String>,
    /// Tombstones by deleted_at
    tombstones: TombstoneIndex,
    /// Last version handed out
    last_version: Version,
    /// Highest version among purged tombstones
    purged_through: Version,
}

/// Rows a watcher at some watermark still has to apply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Changes {
    /// Rows to apply, ascending by version
    pub records: Vec<Record>,
    /// Watermark reached once `records` are applied
    ///
    /// This is the store's last version, not the last listed row: versions
    /// between them belong to purged tombstones or to rows rewritten since.
    pub watermark: Version,
    /// Listed from ZERO: the consumer must replace its view
    pub reset: bool,
}

/// Versioned store for a single record type
///
/// Thread-safe through a single `parking_lot::RwLock`. Reads take the shared
/// path; every mutation, including version allocation, takes the exclusive
/// path.
#[derive(Debug)]
pub struct RecordStore {
    record_type: String,
    ordering_fanout: usize,
    inner: RwLock<StoreInner>,
}

impl RecordStore {
    /// Create an empty store for `record_type`
    ///
    /// `ordering_fanout` only sizes the id index; it has no observable effect.
    pub fn new(record_type: impl Into<String>, ordering_fanout: usize) -> Self {
        let ordering_fanout = ordering_fanout.max(2);
        Self {
            record_type: record_type.into(),
            ordering_fanout,
            inner: RwLock::new(StoreInner {
                by_id: FxHashMap::with_capacity_and_hasher(ordering_fanout, Default::default()),
                by_version: BTreeMap::new(),
                tombstones: TombstoneIndex::new(),
                last_version: Version::ZERO,
                purged_through: Version::ZERO,
            }),
        }
    }

    /// Record type served by this store
    pub fn record_type(&self) -> &str {
        &self.record_type
    }

    /// Configured fanout hint
    pub fn ordering_fanout(&self) -> usize {
        self.ordering_fanout
    }

    /// Get the live record for `id`
    ///
    /// Returns `None` if the id was never set or is currently a tombstone.
    pub fn get(&self, id: &str) -> Option<Record> {
        let inner = self.inner.read();
        inner
            .by_id
            .get(id)
            .filter(|r| !r.is_tombstone())
            .cloned()
    }

    /// Insert or replace the record for `id`
    ///
    /// Assigns the next version, clears any tombstone, and returns the stored
    /// record so the caller sees the assigned version.
    pub fn set(&self, id: &str, data: Vec<u8>) -> Record {
        let now = Timestamp::now();
        let mut inner = self.inner.write();
        let version = inner.last_version.next();
        inner.last_version = version;

        if let Some(old) = inner.by_id.get(id) {
            let (old_version, old_deleted_at) = (old.version, old.deleted_at);
            inner.by_version.remove(&old_version);
            if let Some(deleted_at) = old_deleted_at {
                inner.tombstones.remove(deleted_at, id);
            }
        }

        let record = Record {
            record_type: self.record_type.clone(),
            id: id.to_string(),
            data,
            version,
            modified_at: now,
            deleted_at: None,
        };
        inner.by_version.insert(version, id.to_string());
        inner.by_id.insert(id.to_string(), record.clone());
        record
    }

    /// Tombstone the record for `id`
    ///
    /// Returns the tombstone if a live record was deleted. Deleting a missing
    /// or already deleted id is a no-op: nothing changes and `None` is
    /// returned.
    pub fn delete(&self, id: &str) -> Option<Record> {
        let now = Timestamp::now();
        let mut inner = self.inner.write();
        let old_version = match inner.by_id.get(id) {
            Some(record) if !record.is_tombstone() => record.version,
            _ => return None,
        };

        let version = inner.last_version.next();
        inner.last_version = version;
        inner.by_version.remove(&old_version);
        inner.by_version.insert(version, id.to_string());
        inner.tombstones.insert(now, id.to_string());

        let record = inner.by_id.get_mut(id)?;
        record.version = version;
        record.modified_at = now;
        record.deleted_at = Some(now);
        Some(record.clone())
    }

    /// All rows (live and tombstone) with `version > since`, ascending
    ///
    /// `Version::ZERO` returns the full contents including tombstones.
    pub fn list(&self, since: Version) -> Vec<Record> {
        let inner = self.inner.read();
        inner
            .by_version
            .range((Bound::Excluded(since), Bound::Unbounded))
            .filter_map(|(_, id)| inner.by_id.get(id).cloned())
            .collect()
    }

    /// Rows a watcher at `since` has not applied yet
    ///
    /// If `since` predates a purged tombstone the watcher may have missed a
    /// delete, so the listing restarts from ZERO with `reset` set. Staleness,
    /// listing and watermark are read under one lock.
    pub fn changes(&self, since: Version) -> Changes {
        let inner = self.inner.read();
        let from = if !since.is_zero() && since < inner.purged_through {
            Version::ZERO
        } else {
            since
        };
        let records = inner
            .by_version
            .range((Bound::Excluded(from), Bound::Unbounded))
            .filter_map(|(_, id)| inner.by_id.get(id).cloned())
            .collect();
        Changes {
            records,
            watermark: inner.last_version.max(from),
            reset: from.is_zero(),
        }
    }

    /// All live records ascending by version, with the current watermark
    ///
    /// Both are read under one lock so the watermark matches the contents.
    pub fn live_records(&self) -> (Vec<Record>, Version) {
        let inner = self.inner.read();
        let records = inner
            .by_version
            .values()
            .filter_map(|id| inner.by_id.get(id))
            .filter(|r| !r.is_tombstone())
            .cloned()
            .collect();
        (records, inner.last_version)
    }

    /// Permanently remove every tombstone with `deleted_at < cutoff`
    ///
    /// Version allocation is unaffected. Returns the number of rows removed.
    pub fn clear_deleted(&self, cutoff: Timestamp) -> usize {
        let mut inner = self.inner.write();
        let expired = inner.tombstones.take_older_than(cutoff);
        let mut purged = 0;
        for id in expired {
            if let Some(record) = inner.by_id.remove(&id) {
                inner.by_version.remove(&record.version);
                if record.version > inner.purged_through {
                    inner.purged_through = record.version;
                }
                purged += 1;
            }
        }
        if purged > 0 {
            debug!(
                target: "databroker::store",
                record_type = %self.record_type,
                purged,
                purged_through = %inner.purged_through,
                "Purged tombstones"
            );
        }
        purged
    }

    /// Last version handed out by this store (`ZERO` if never written)
    pub fn latest_version(&self) -> Version {
        self.inner.read().last_version
    }

    /// Highest version ever purged (`ZERO` if nothing was purged)
    pub fn purged_through(&self) -> Version {
        self.inner.read().purged_through
    }

    /// Number of rows, live and tombstone
    pub fn len(&self) -> usize {
        self.inner.read().by_id.len()
    }

    /// True if the store has no rows
    pub fn is_empty(&self) -> bool {
        self.inner.read().by_id.is_empty()
    }

    /// Number of tombstones awaiting purge
    pub fn tombstone_count(&self) -> usize {
        self.inner.read().tombstones.len()
    }
}
