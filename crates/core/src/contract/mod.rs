//! Contract types for the bitemporal store
//!
//! These types define how logical objects are addressed and versioned:
//!
//! - `timestamp`: Microsecond instants on both time axes
//! - `version`: Hidden bookkeeping (`VersionInfo`) and read bounds (`AsOf`)
//! - `identity`: Logical object addresses (`ObjectKey`, `IdentityValue`)

pub mod identity;
pub mod timestamp;
pub mod version;

// Re-exports
pub use identity::{IdentityValue, ObjectKey};
pub use timestamp::Timestamp;
pub use version::{AsOf, VersionInfo};
