//! Broker engine
//!
//! This crate ties the record stores together into a running broker:
//! - Registry: lazily created store per record type, Get/Set/Delete
//! - Signal: coalescing broadcast that wakes sync loops after writes
//! - Sync: push-based change feed with restart and purge detection
//! - TombstoneReaper: background purge of old deletes
//! - Replica: consumer-side mirror driven by sync batches
//! - BrokerConfig: `databroker.toml` configuration
//!
//! Stores and the reaper are synchronous; only the sync loop needs a tokio
//! runtime.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod metrics;
pub mod reaper;
pub mod registry;
pub mod replica;
pub mod signal;
pub mod sync;
pub mod typed;

pub use config::{BrokerConfig, CONFIG_FILE_NAME, DEFAULT_RETENTION_WINDOW_MS};
pub use metrics::RegistryMetrics;
pub use reaper::TombstoneReaper;
pub use registry::{Registry, Snapshot};
pub use replica::Replica;
pub use signal::{Signal, Waiter};
pub use sync::{SyncBatch, SyncRequest, SyncStream, SYNC_CHANNEL_CAPACITY};
pub use typed::TypedCollection;
