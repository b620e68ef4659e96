//! Replica: a watcher's local mirror of one record type
//!
//! Proxies keep a replica per record type they care about and feed it every
//! batch from a sync stream. The replica remembers the server version and
//! watermark it has applied, so after a disconnect `next_request()` resumes
//! exactly where it left off, or starts over if the server restarted.

use std::collections::BTreeMap;

use databroker_core::{InstanceId, Record, Version};

use crate::sync::{SyncBatch, SyncRequest};

/// Local mirror of the live records of one type
#[derive(Debug, Clone)]
pub struct Replica {
    record_type: String,
    server_version: Option<InstanceId>,
    record_version: Version,
    records: BTreeMap<String, Record>,
}

impl Replica {
    /// Empty replica that will sync from the beginning
    pub fn new(record_type: impl Into<String>) -> Self {
        Self {
            record_type: record_type.into(),
            server_version: None,
            record_version: Version::ZERO,
            records: BTreeMap::new(),
        }
    }

    /// Apply one batch
    ///
    /// A `reset` batch replaces the whole view, even when it carries no
    /// records. Tombstones remove their id; everything else is upserted.
    /// A batch for another type leaves the replica untouched and returns false.
    pub fn apply(&mut self, batch: &SyncBatch) -> bool {
        if batch.record_type != self.record_type {
            return false;
        }
        if batch.reset {
            self.records.clear();
        }
        for record in &batch.records {
            if record.is_tombstone() {
                self.records.remove(&record.id);
            } else {
                self.records.insert(record.id.clone(), record.clone());
            }
        }
        self.server_version = Some(batch.server_version);
        self.record_version = batch.record_version;
        true
    }

    /// Request that resumes from everything applied so far
    pub fn next_request(&self) -> SyncRequest {
        let request = SyncRequest::new(self.record_type.clone());
        match self.server_version {
            Some(server_version) => request.resume_from(server_version, self.record_version),
            None => request,
        }
    }

    /// Live record for `id`
    pub fn get(&self, id: &str) -> Option<&Record> {
        self.records.get(id)
    }

    /// Live records ordered by id
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.records.values()
    }

    /// Number of live records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if no live records are mirrored
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Last applied version
    pub fn record_version(&self) -> Version {
        self.record_version
    }

    /// Server version of the last applied batch
    pub fn server_version(&self) -> Option<InstanceId> {
        self.server_version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use databroker_core::Timestamp;

    fn record(id: &str, version: u64, deleted: bool) -> Record {
        Record {
            record_type: "session".to_string(),
            id: id.to_string(),
            data: vec![],
            version: Version::new(version),
            modified_at: Timestamp::from_secs(1),
            deleted_at: deleted.then(|| Timestamp::from_secs(1)),
        }
    }

    fn batch(server: InstanceId, records: Vec<Record>, reset: bool) -> SyncBatch {
        let record_version = records.last().map_or(Version::ZERO, |r| r.version);
        SyncBatch {
            record_type: "session".to_string(),
            server_version: server,
            records,
            record_version,
            reset,
        }
    }

    #[test]
    fn test_fresh_replica_requests_from_zero() {
        let replica = Replica::new("session");
        let request = replica.next_request();
        assert_eq!(request.record_type, "session");
        assert_eq!(request.server_version, None);
        assert_eq!(request.record_version, Version::ZERO);
    }

    #[test]
    fn test_apply_upserts_and_deletes() {
        let server = InstanceId::generate();
        let mut replica = Replica::new("session");
        replica.apply(&batch(server, vec![record("a", 1, false), record("b", 2, false)], true));
        replica.apply(&batch(server, vec![record("a", 3, true)], false));

        assert!(replica.get("a").is_none());
        assert_eq!(replica.get("b").unwrap().version, Version::new(2));
        assert_eq!(replica.record_version(), Version::new(3));

        let request = replica.next_request();
        assert_eq!(request.server_version, Some(server));
        assert_eq!(request.record_version, Version::new(3));
    }

    #[test]
    fn test_reset_replaces_view() {
        let mut replica = Replica::new("session");
        replica.apply(&batch(InstanceId::generate(), vec![record("old", 7, false)], true));

        let restarted = InstanceId::generate();
        replica.apply(&batch(restarted, vec![record("new", 1, false)], true));

        assert!(replica.get("old").is_none());
        assert_eq!(replica.len(), 1);
        assert_eq!(replica.server_version(), Some(restarted));
        assert_eq!(replica.record_version(), Version::new(1));
    }

    #[test]
    fn test_empty_reset_clears_watermark() {
        let mut replica = Replica::new("session");
        replica.apply(&batch(InstanceId::generate(), vec![record("a", 4, false)], true));

        let restarted = InstanceId::generate();
        replica.apply(&batch(restarted, vec![], true));
        assert!(replica.is_empty());
        assert_eq!(replica.record_version(), Version::ZERO);
        assert_eq!(replica.next_request().server_version, Some(restarted));
    }

    #[test]
    fn test_batch_watermark_past_last_record() {
        let server = InstanceId::generate();
        let mut full = batch(server, vec![record("b", 2, false)], true);
        full.record_version = Version::new(3);

        let mut replica = Replica::new("session");
        assert!(replica.apply(&full));
        assert_eq!(replica.record_version(), Version::new(3));
        assert_eq!(replica.next_request().record_version, Version::new(3));
    }

    #[test]
    fn test_foreign_batch_is_ignored() {
        let server = InstanceId::generate();
        let mut replica = Replica::new("session");
        replica.apply(&batch(server, vec![record("a", 1, false)], true));

        let mut foreign = batch(InstanceId::generate(), vec![], true);
        foreign.record_type = "config".to_string();
        foreign.record_version = Version::new(40);
        assert!(!replica.apply(&foreign));

        assert_eq!(replica.len(), 1);
        assert_eq!(replica.server_version(), Some(server));
        assert_eq!(replica.record_version(), Version::new(1));
    }
}
