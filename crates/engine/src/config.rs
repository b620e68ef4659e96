//! Broker configuration via `databroker.toml`
//!
//! Two knobs are recognized:
//! - `retention_window_ms`: how long a tombstone stays listable before the
//!   reaper may purge it. The reaper ticks every half window, so a tombstone
//!   lives at most 1.5x this long.
//! - `ordering_fanout`: sizing hint for the per-type stores. Pure performance
//!   knob with no observable effect.
//!
//! Missing fields fall back to defaults, so an empty file is valid.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use databroker_core::{BrokerError, BrokerResult};
use databroker_storage::DEFAULT_ORDERING_FANOUT;

/// Config file name
pub const CONFIG_FILE_NAME: &str = "databroker.toml";

/// Default tombstone retention: one hour
pub const DEFAULT_RETENTION_WINDOW_MS: u64 = 60 * 60 * 1000;

/// Broker configuration
///
/// # Example
///
/// ```toml
/// # Tombstones older than this may be purged (milliseconds)
/// retention_window_ms = 3600000
///
/// # Store sizing hint
/// ordering_fanout = 8
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Tombstone retention window in milliseconds
    #[serde(default = "default_retention_window_ms")]
    pub retention_window_ms: u64,
    /// Branching/sizing hint for record stores
    #[serde(default = "default_ordering_fanout")]
    pub ordering_fanout: usize,
}

fn default_retention_window_ms() -> u64 {
    DEFAULT_RETENTION_WINDOW_MS
}

fn default_ordering_fanout() -> usize {
    DEFAULT_ORDERING_FANOUT
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            retention_window_ms: default_retention_window_ms(),
            ordering_fanout: default_ordering_fanout(),
        }
    }
}

impl BrokerConfig {
    /// Override the retention window
    pub fn with_retention_window(mut self, window: Duration) -> Self {
        self.retention_window_ms = window.as_millis() as u64;
        self
    }

    /// Override the ordering fanout
    pub fn with_ordering_fanout(mut self, fanout: usize) -> Self {
        self.ordering_fanout = fanout;
        self
    }

    /// Tombstone retention window
    pub fn retention_window(&self) -> Duration {
        Duration::from_millis(self.retention_window_ms)
    }

    /// Interval between reaper passes: half the retention window
    pub fn reap_interval(&self) -> Duration {
        self.retention_window() / 2
    }

    /// Check every field
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the retention window is shorter than 2ms
    /// (the reaper needs a non-zero tick) or the fanout is below 2.
    pub fn validate(&self) -> BrokerResult<()> {
        if self.retention_window_ms < 2 {
            return Err(BrokerError::invalid_input(
                "retention_window_ms must be >= 2",
            ));
        }
        if self.ordering_fanout < 2 {
            return Err(BrokerError::invalid_input("ordering_fanout must be >= 2"));
        }
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Databroker configuration
#
# Tombstone retention window in milliseconds (default: one hour).
# Watchers that stay disconnected longer than this are forced to resync.
retention_window_ms = 3600000

# Sizing hint for per-type record stores (default: 8).
ordering_fanout = 8
"#
    }

    /// Parse and validate config from TOML text
    pub fn from_toml_str(content: &str) -> BrokerResult<Self> {
        let config: BrokerConfig = toml::from_str(content)
            .map_err(|e| BrokerError::invalid_input(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate config from a file path
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_file(path: &Path) -> BrokerResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            BrokerError::internal(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            BrokerError::InvalidInput(msg) => {
                BrokerError::invalid_input(format!("{} ({})", msg, path.display()))
            }
            other => other,
        })
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> BrokerResult<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                BrokerError::internal(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }
}
