//! Databroker - in-memory versioned record store with a change feed
//!
//! The databroker keeps the policy-relevant records of an access-control
//! deployment (sessions, configuration objects) in memory and streams every
//! change to watching proxies, so that all instances converge without a
//! shared database.
//!
//! # Quick Start
//!
//! ```ignore
//! use databroker::{BrokerConfig, Registry, Replica};
//!
//! let registry = Registry::new(BrokerConfig::default())?;
//! registry.set("session", "token-1", b"...".to_vec());
//!
//! let mut replica = Replica::new("session");
//! let mut stream = registry.watch(replica.next_request());
//! while let Some(batch) = stream.next().await {
//!     replica.apply(&batch);
//! }
//! ```
//!
//! # Architecture
//!
//! - `databroker-core`: records, versions, timestamps, errors
//! - `databroker-storage`: the per-type versioned record store
//! - `databroker-engine`: registry, signal, sync loop, reaper, replica

pub use databroker_core::{BrokerError, BrokerResult, InstanceId, Record, Timestamp, Version};
pub use databroker_engine::*;
