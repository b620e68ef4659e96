//! Storage layer for the databroker
//!
//! This crate implements the per-type record store:
//! - RecordStore: id index plus version-ordered index behind one RwLock
//! - Monotonic version allocation under the store's write lock
//! - Soft deletes (tombstones) and age-based purging
//! - TombstoneIndex: deleted_at ordering for O(purged) cleanup

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod record_store;
pub mod tombstones;

pub use record_store::{Changes, RecordStore, DEFAULT_ORDERING_FANOUT};
pub use tombstones::TombstoneIndex;
