//! Record version tokens
//!
//! Every mutation of a record store produces a new [`Version`]. Versions come
//! from a single counter per store, so within one record type they are unique
//! and totally ordered.
//!
//! ## Wire form
//!
//! On the wire a version is an opaque string: twelve upper-case hex digits,
//! zero padded. Fixed width means lexical order equals numeric order, so
//! clients that only compare strings still see the right ordering.
//!
//! The empty string is [`Version::ZERO`], which means "from the beginning".
//!
//! ```
//! use databroker_core::Version;
//!
//! let v: Version = "00000000002A".parse().unwrap();
//! assert_eq!(v.as_u64(), 42);
//! assert_eq!(v.to_string(), "00000000002A");
//! assert_eq!("".parse::<Version>().unwrap(), Version::ZERO);
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BrokerError;

/// Width of the wire form in hex digits
const WIRE_WIDTH: usize = 12;

/// Version of a record within its store
///
/// ## Invariants
///
/// - Assigned only by the owning store
/// - Never reused, never decreasing
/// - `ZERO` is never assigned to a record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Version(u64);

impl Version {
    /// "Nothing seen yet": listing since `ZERO` returns everything
    pub const ZERO: Version = Version(0);

    /// Create a version from a raw counter value
    #[inline]
    pub const fn new(raw: u64) -> Self {
        Version(raw)
    }

    /// Raw counter value
    #[inline]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// True for `ZERO`
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// The version that follows this one
    #[inline]
    pub const fn next(&self) -> Self {
        Version(self.0 + 1)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:0width$X}", self.0, width = WIRE_WIDTH)
    }
}

impl FromStr for Version {
    type Err = BrokerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Version::ZERO);
        }
        u64::from_str_radix(s, 16)
            .map(Version)
            .map_err(|e| BrokerError::invalid_input(format!("invalid version '{}': {}", s, e)))
    }
}

impl From<Version> for String {
    fn from(v: Version) -> Self {
        v.to_string()
    }
}

impl TryFrom<String> for Version {
    type Error = BrokerError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<u64> for Version {
    fn from(raw: u64) -> Self {
        Version(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_version_zero() {
        assert!(Version::ZERO.is_zero());
        assert_eq!(Version::default(), Version::ZERO);
        assert_eq!(Version::ZERO.next(), Version::new(1));
    }

    #[test]
    fn test_version_wire_form() {
        assert_eq!(Version::new(1).to_string(), "000000000001");
        assert_eq!(Version::new(0xBEEF).to_string(), "00000000BEEF");
    }

    #[test]
    fn test_version_parse_empty_is_zero() {
        assert_eq!("".parse::<Version>().unwrap(), Version::ZERO);
    }

    #[test]
    fn test_version_parse_garbage() {
        let err = "not-hex".parse::<Version>().unwrap_err();
        assert!(matches!(err, BrokerError::InvalidInput(_)));
    }

    #[test]
    fn test_version_serde_uses_wire_form() {
        let json = serde_json::to_string(&Version::new(10)).unwrap();
        assert_eq!(json, "\"00000000000A\"");
        let back: Version = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Version::new(10));
    }

    proptest! {
        #[test]
        fn wire_order_matches_numeric_order(a in 0u64..(1 << 48), b in 0u64..(1 << 48)) {
            let (va, vb) = (Version::new(a), Version::new(b));
            prop_assert_eq!(va.cmp(&vb), va.to_string().cmp(&vb.to_string()));
        }
    }
}
