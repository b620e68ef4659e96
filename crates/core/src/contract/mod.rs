//! Contract types shared by every layer
//!
//! - `version`: per-store record versions and their wire form
//! - `timestamp`: microsecond timestamps for `modified_at` / `deleted_at`
//! - `instance`: registry lifetime identity used for restart detection

pub mod instance;
pub mod timestamp;
pub mod version;

pub use instance::InstanceId;
pub use timestamp::Timestamp;
pub use version::Version;
