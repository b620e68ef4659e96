//! Server instance identity
//!
//! All broker state lives in memory and is rebuilt from nothing on restart.
//! An [`InstanceId`] is generated once when a registry is constructed and is
//! sent with every sync batch. A watcher that presents a different id knows
//! its watermark refers to history that no longer exists.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::BrokerError;

/// Identity of one registry lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceId(Uuid);

impl InstanceId {
    /// Generate a fresh random id
    pub fn generate() -> Self {
        InstanceId(Uuid::new_v4())
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for InstanceId {
    type Err = BrokerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(InstanceId)
            .map_err(|e| BrokerError::invalid_input(format!("invalid server version '{}': {}", s, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_is_unique() {
        assert_ne!(InstanceId::generate(), InstanceId::generate());
    }

    #[test]
    fn test_display_parse_round_trip() {
        let id = InstanceId::generate();
        let parsed: InstanceId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("restart-me".parse::<InstanceId>().is_err());
    }
}
