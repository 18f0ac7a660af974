//! Bitemporal version bookkeeping
//!
//! Every persisted fact is addressed by two counters:
//!
//! - **effective version**: incremented for each *new fact* about an object
//!   (a head write)
//! - **entry version**: incremented for each *correction* of one specific fact
//!
//! Together with the effective and entry times, these form the hidden
//! bookkeeping stamped onto a record after the backend accepts a write.

use super::timestamp::Timestamp;
use serde::{Deserialize, Serialize};

/// Hidden bookkeeping carried by every record instance
///
/// A freshly constructed record has both versions at 0, both times at
/// `Timestamp::MAX`, and no transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionInfo {
    /// When the fact became true
    pub effective_time: Timestamp,
    /// When the store recorded this row
    pub entry_time: Timestamp,
    /// Sequence number of distinct facts (0 = never written)
    pub effective_version: u64,
    /// Sequence number of corrections to this fact (0 = never written)
    pub entry_version: u64,
    /// Backend-assigned transaction (0 = never written)
    pub transaction_id: u64,
}

impl VersionInfo {
    /// Bookkeeping of a record that has never been written
    pub const UNWRITTEN: VersionInfo = VersionInfo {
        effective_time: Timestamp::MAX,
        entry_time: Timestamp::MAX,
        effective_version: 0,
        entry_version: 0,
        transaction_id: 0,
    };

    /// True once a backend has stamped this record
    #[inline]
    pub const fn is_written(&self) -> bool {
        self.effective_version > 0
    }

    /// Versions and effective time for the next write of this record
    ///
    /// A head write records a new fact: next effective version, first entry,
    /// effective time left for the backend to assign. A correction keeps the
    /// fact and its effective time but bumps the entry version.
    pub fn next_write(&self, as_of_effective_time: bool) -> (u64, u64, Timestamp) {
        if as_of_effective_time {
            (
                self.effective_version,
                self.entry_version + 1,
                self.effective_time,
            )
        } else {
            (self.effective_version + 1, 1, Timestamp::MAX)
        }
    }
}

impl Default for VersionInfo {
    fn default() -> Self {
        VersionInfo::UNWRITTEN
    }
}

/// Bitemporal read bounds
///
/// A read resolves to the latest envelope whose effective time and entry time
/// both lie at or below these bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AsOf {
    /// Upper bound on effective time
    pub effective_time: Timestamp,
    /// Upper bound on entry time
    pub entry_time: Timestamp,
}

impl AsOf {
    /// No bounds: the latest known state
    pub const LATEST: AsOf = AsOf {
        effective_time: Timestamp::MAX,
        entry_time: Timestamp::MAX,
    };

    /// Bound effective time only
    pub const fn effective(effective_time: Timestamp) -> Self {
        AsOf {
            effective_time,
            entry_time: Timestamp::MAX,
        }
    }

    /// Bound both axes
    pub const fn new(effective_time: Timestamp, entry_time: Timestamp) -> Self {
        AsOf {
            effective_time,
            entry_time,
        }
    }

    /// Replace the entry-time bound
    pub const fn with_entry_time(mut self, entry_time: Timestamp) -> Self {
        self.entry_time = entry_time;
        self
    }

    /// Whether a row with these times is visible under the bounds
    #[inline]
    pub fn admits(&self, effective_time: Timestamp, entry_time: Timestamp) -> bool {
        effective_time <= self.effective_time && entry_time <= self.entry_time
    }
}

impl Default for AsOf {
    fn default() -> Self {
        AsOf::LATEST
    }
}
