//! The record type stored by the broker
//!
//! A record is addressed by `(record_type, id)` and carries an opaque `data`
//! payload. The broker never interprets `data`; encoding belongs to whoever
//! writes it (sessions, configuration objects, ...).
//!
//! A record whose `deleted_at` is set is a tombstone. Tombstones stay
//! listable so that watchers learn about the delete, until the reaper purges
//! them.

use serde::{Deserialize, Serialize};

use crate::contract::{Timestamp, Version};

/// A versioned record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Which store this record lives in
    pub record_type: String,
    /// Unique within `record_type`
    pub id: String,
    /// Opaque payload, retained on tombstones
    pub data: Vec<u8>,
    /// Assigned by the store on every create/update/delete
    pub version: Version,
    /// Time of the last mutation
    pub modified_at: Timestamp,
    /// Present only for tombstones
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<Timestamp>,
}

impl Record {
    /// True if this record marks a delete
    #[inline]
    pub fn is_tombstone(&self) -> bool {
        self.deleted_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(deleted_at: Option<Timestamp>) -> Record {
        Record {
            record_type: "session".to_string(),
            id: "a".to_string(),
            data: b"payload".to_vec(),
            version: Version::new(3),
            modified_at: Timestamp::from_secs(100),
            deleted_at,
        }
    }

    #[test]
    fn test_live_record_is_not_tombstone() {
        let r = record(None);
        assert!(!r.is_tombstone());
        assert!(record(Some(Timestamp::from_secs(100))).is_tombstone());
    }

    #[test]
    fn test_live_record_serializes_without_deleted_at() {
        let json = serde_json::to_string(&record(None)).unwrap();
        assert!(!json.contains("deleted_at"));
        assert!(json.contains("\"version\":\"000000000003\""));

        let back: Record = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record(None));
    }
}
