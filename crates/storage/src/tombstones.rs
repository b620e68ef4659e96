//! Tombstone index for efficient purging
//!
//! Maps `deleted_at` → ids so that purging tombstones older than a cutoff is
//! O(purged count) instead of a scan over every record in the store:
//! - Ordered by `(deleted_at, id)` using a BTreeSet
//! - `take_older_than()` splits off everything strictly before the cutoff

use std::collections::BTreeSet;

use databroker_core::Timestamp;

/// Tombstone index: (deleted_at, id)
#[derive(Debug, Default)]
pub struct TombstoneIndex {
    entries: BTreeSet<(Timestamp, String)>,
}

impl TombstoneIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a new tombstone
    pub fn insert(&mut self, deleted_at: Timestamp, id: String) {
        self.entries.insert((deleted_at, id));
    }

    /// Stop tracking a tombstone (the id was set again)
    pub fn remove(&mut self, deleted_at: Timestamp, id: &str) {
        self.entries.remove(&(deleted_at, id.to_string()));
    }

    /// Remove and return every id deleted strictly before `cutoff`
    pub fn take_older_than(&mut self, cutoff: Timestamp) -> Vec<String> {
        // Everything >= (cutoff, "") stays; "" sorts before every other id.
        let keep = self.entries.split_off(&(cutoff, String::new()));
        let expired = std::mem::replace(&mut self.entries, keep);
        expired.into_iter().map(|(_, id)| id).collect()
    }

    /// Number of tracked tombstones
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no tombstones are tracked
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_older_than_is_strict() {
        let mut index = TombstoneIndex::new();
        index.insert(Timestamp::from_micros(500), "a".to_string());
        index.insert(Timestamp::from_micros(800), "b".to_string());
        index.insert(Timestamp::from_micros(1000), "c".to_string());
        index.insert(Timestamp::from_micros(1200), "d".to_string());

        let mut expired = index.take_older_than(Timestamp::from_micros(1000));
        expired.sort();
        assert_eq!(expired, vec!["a".to_string(), "b".to_string()]);

        // Deleted exactly at the cutoff is kept
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_remove_revived_id() {
        let mut index = TombstoneIndex::new();
        index.insert(Timestamp::from_micros(500), "a".to_string());
        index.remove(Timestamp::from_micros(500), "a");
        assert!(index.is_empty());
        assert!(index.take_older_than(Timestamp::MAX).is_empty());
    }

    #[test]
    fn test_same_timestamp_multiple_ids() {
        let mut index = TombstoneIndex::new();
        for id in ["x", "y", "z"] {
            index.insert(Timestamp::from_micros(100), id.to_string());
        }
        assert_eq!(index.len(), 3);
        assert_eq!(index.take_older_than(Timestamp::from_micros(101)).len(), 3);
        assert!(index.is_empty());
    }
}
