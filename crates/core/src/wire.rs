//! Backend-agnostic read/write shapes
//!
//! The same types are exchanged with an in-process backend and carried as
//! JSON bodies by the remote facade. Identity values and contents are
//! canonical JSON text; timestamps are integer microseconds.

use crate::contract::{AsOf, IdentityValue, ObjectKey, Timestamp, VersionInfo};
use serde::{Deserialize, Serialize};

/// A group of reads sharing one identity type and one pair of time bounds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadRequest {
    /// Identity type of every requested object
    pub identity_type: String,
    /// Upper bound on effective time
    pub effective_time_bound: Timestamp,
    /// Upper bound on entry time
    pub entry_time_bound: Timestamp,
    /// Identity values to resolve
    pub identity_values: Vec<IdentityValue>,
}

impl ReadRequest {
    /// Create an empty group
    pub fn new(identity_type: impl Into<String>, as_of: AsOf) -> Self {
        ReadRequest {
            identity_type: identity_type.into(),
            effective_time_bound: as_of.effective_time,
            entry_time_bound: as_of.entry_time,
            identity_values: Vec::new(),
        }
    }

    /// The bounds of this group
    pub fn as_of(&self) -> AsOf {
        AsOf::new(self.effective_time_bound, self.entry_time_bound)
    }
}

/// One envelope to insert
///
/// `entry_time` is always `Timestamp::MAX` from clients; backends assign it.
/// `effective_time` is `Timestamp::MAX` for head writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteRequest {
    /// Identity type of the object
    pub identity_type: String,
    /// Concrete type of the stored record
    pub concrete_type: String,
    /// Serialized identity tuple
    pub identity_value: IdentityValue,
    /// Serialized record
    pub contents: String,
    /// Version of the fact being written
    pub effective_version: u64,
    /// Correction number of the fact being written
    pub entry_version: u64,
    /// Effective time requested by the client (MAX for head writes)
    pub effective_time: Timestamp,
    /// Entry time requested by the client (ignored by backends)
    pub entry_time: Timestamp,
}

impl WriteRequest {
    /// Address of the written object
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.identity_type.clone(), self.identity_value.clone())
    }
}

/// A batch of writes committed atomically, with audit fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteBatch {
    /// Envelopes to insert
    pub writes: Vec<WriteRequest>,
    /// Writer's user name
    pub username: String,
    /// Writer's host name
    pub hostname: String,
    /// Free-form comment
    #[serde(default)]
    pub comment: String,
}

/// A persisted envelope, as returned by backends
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Identity type of the object
    pub identity_type: String,
    /// Serialized identity tuple
    pub identity_value: IdentityValue,
    /// Concrete type of the stored record
    pub concrete_type: String,
    /// Serialized record
    pub contents: String,
    /// Version of the fact
    pub effective_version: u64,
    /// Correction number of the fact
    pub entry_version: u64,
    /// When the fact became true
    pub effective_time: Timestamp,
    /// When the store recorded this row
    pub entry_time: Timestamp,
    /// Backend-assigned transaction
    pub transaction_id: u64,
}

impl Envelope {
    /// Address of the stored object
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.identity_type.clone(), self.identity_value.clone())
    }

    /// Bookkeeping to stamp onto the record
    pub fn version_info(&self) -> VersionInfo {
        VersionInfo {
            effective_time: self.effective_time,
            entry_time: self.entry_time,
            effective_version: self.effective_version,
            entry_version: self.entry_version,
            transaction_id: self.transaction_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_request_bounds() {
        let as_of = AsOf::new(Timestamp::from_secs(1), Timestamp::from_secs(2));
        let req = ReadRequest::new("Outer", as_of);
        assert_eq!(req.as_of(), as_of);
        assert!(req.identity_values.is_empty());
    }

    #[test]
    fn test_write_batch_comment_defaults() {
        let json = r#"{"writes":[],"username":"u","hostname":"h"}"#;
        let batch: WriteBatch = serde_json::from_str(json).unwrap();
        assert_eq!(batch.comment, "");
    }

    #[test]
    fn test_envelope_version_info() {
        let env = Envelope {
            identity_type: "Outer".into(),
            identity_value: IdentityValue::from_canonical("[\"outer\"]"),
            concrete_type: "Outer".into(),
            contents: "{}".into(),
            effective_version: 2,
            entry_version: 3,
            effective_time: Timestamp::from_secs(5),
            entry_time: Timestamp::from_secs(6),
            transaction_id: 9,
        };
        let info = env.version_info();
        assert_eq!(info.effective_version, 2);
        assert_eq!(info.entry_version, 3);
        assert_eq!(info.transaction_id, 9);
        assert_eq!(env.key().to_string(), "Outer[\"outer\"]");
    }
}
