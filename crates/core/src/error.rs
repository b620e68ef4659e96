//! Error types for the databroker
//!
//! All fallible operations return [`BrokerResult`]. We use `thiserror` for the
//! `Display` and `Error` implementations.
//!
//! Two variants are expected lifecycle outcomes rather than faults:
//! - [`BrokerError::NotFound`]: a get on an id with no live record
//! - [`BrokerError::Cancelled`] / [`BrokerError::DeadlineExceeded`]: a sync
//!   watcher went away or ran out of time

use thiserror::Error;

/// Result type alias for databroker operations
pub type BrokerResult<T> = std::result::Result<T, BrokerError>;

/// Error types for the databroker
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokerError {
    /// No live record exists for the id (never set, or currently a tombstone)
    #[error("record not found: {record_type}/{id}")]
    NotFound {
        /// Record type that was queried
        record_type: String,
        /// Record id that was queried
        id: String,
    },

    /// The sync caller disconnected or cancelled
    #[error("sync cancelled")]
    Cancelled,

    /// The sync caller's deadline elapsed
    #[error("sync deadline exceeded")]
    DeadlineExceeded,

    /// Invalid configuration or unparsable request field
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Payload encode/decode failure on the collaborator side
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Unexpected internal failure (config I/O, thread spawn, ...)
    #[error("internal error: {0}")]
    Internal(String),
}

impl BrokerError {
    /// Create a `NotFound` error for a (type, id) pair
    pub fn not_found(record_type: impl Into<String>, id: impl Into<String>) -> Self {
        BrokerError::NotFound {
            record_type: record_type.into(),
            id: id.into(),
        }
    }

    /// Create an `InvalidInput` error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        BrokerError::InvalidInput(msg.into())
    }

    /// Create an `Internal` error
    pub fn internal(msg: impl Into<String>) -> Self {
        BrokerError::Internal(msg.into())
    }

    /// True for `NotFound`
    pub fn is_not_found(&self) -> bool {
        matches!(self, BrokerError::NotFound { .. })
    }

    /// True when a sync loop ended because its caller went away
    ///
    /// These are not logged as errors.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, BrokerError::Cancelled | BrokerError::DeadlineExceeded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_not_found() {
        let err = BrokerError::not_found("session", "abc");
        let msg = err.to_string();
        assert!(msg.contains("record not found"));
        assert!(msg.contains("session/abc"));
    }

    #[test]
    fn test_error_display_invalid_input() {
        let err = BrokerError::invalid_input("ordering_fanout must be >= 2");
        assert_eq!(
            err.to_string(),
            "invalid input: ordering_fanout must be >= 2"
        );
    }

    #[test]
    fn test_error_classification() {
        assert!(BrokerError::not_found("t", "i").is_not_found());
        assert!(!BrokerError::Cancelled.is_not_found());

        assert!(BrokerError::Cancelled.is_cancellation());
        assert!(BrokerError::DeadlineExceeded.is_cancellation());
        assert!(!BrokerError::internal("boom").is_cancellation());
    }

    #[test]
    fn test_error_pattern_matching() {
        match BrokerError::not_found("config", "route-1") {
            BrokerError::NotFound { record_type, id } => {
                assert_eq!(record_type, "config");
                assert_eq!(id, "route-1");
            }
            other => panic!("Wrong error variant: {other:?}"),
        }
    }
}
