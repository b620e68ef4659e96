//! Core types for the databroker
//!
//! This crate defines the vocabulary shared by storage and engine:
//! - Record: a versioned, opaque payload addressed by (type, id)
//! - Version: per-store monotonic version token
//! - Timestamp: microsecond wall-clock time
//! - InstanceId: registry lifetime identity for restart detection
//! - BrokerError: error type hierarchy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod contract;
pub mod error;
pub mod record;

pub use contract::{InstanceId, Timestamp, Version};
pub use error::{BrokerError, BrokerResult};
pub use record::Record;
