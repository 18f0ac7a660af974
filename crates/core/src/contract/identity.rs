//! Logical object addressing
//!
//! A logical object is addressed by its identity type plus the canonical
//! serialization of its identity field values. The address is stable across
//! every version of the object.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical serialized identity tuple
///
/// Always the compact JSON text of an array of wire values, e.g. `["outer"]`.
/// Two values are equal exactly when they address the same object.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityValue(String);

impl IdentityValue {
    /// Wrap already-canonical JSON text
    pub fn from_canonical(json: impl Into<String>) -> Self {
        IdentityValue(json.into())
    }

    /// Serialize a tuple of wire values
    pub fn from_values(values: &[serde_json::Value]) -> Self {
        // Arrays of already-normalized values serialize deterministically.
        IdentityValue(serde_json::Value::Array(values.to_vec()).to_string())
    }

    /// The canonical JSON text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Raw bytes, as carried by envelopes
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for IdentityValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Address of a logical object across all its versions
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectKey {
    /// The type defining the identity shape
    pub identity_type: String,
    /// The serialized identity tuple
    pub identity_value: IdentityValue,
}

impl ObjectKey {
    /// Create a key
    pub fn new(identity_type: impl Into<String>, identity_value: IdentityValue) -> Self {
        ObjectKey {
            identity_type: identity_type.into(),
            identity_value,
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.identity_type, self.identity_value)
    }
}
