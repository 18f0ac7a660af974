//! Error types for Vellum
//!
//! All failures surfaced by the registry, codec, store engine and backends are
//! represented by [`VellumError`]. Errors are:
//! - **Normalized**: backend-native failures are classified into a small set
//!   of kinds before they reach callers
//! - **Serializable**: they travel unchanged across the remote facade
//! - **Cloneable**: one batch failure resolves many pending results
//!
//! # Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Lookup | `NotFound` |
//! | Write conflicts | `DuplicateWrite`, `FailedUpdate` |
//! | Type definition | `MissingIdentityField`, `DuplicateIdentityDefinition`, `UnsupportedFieldShape`, `DuplicateRegistration`, `UnknownBase`, `ReservedField` |
//! | Typing | `UnresolvableType`, `NotPersistable`, `TemporaryType`, `IdentityChange`, `InvalidValue` |
//! | Transaction | `MixedTransaction`, `TransactionAlreadyActive` |
//! | System | `Serialization`, `Config`, `Unknown` |

use serde::{Deserialize, Serialize};

/// Result type alias for Vellum operations
pub type Result<T> = std::result::Result<T, VellumError>;

/// Error taxonomy for the object store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VellumError {
    // ==================== Lookup ====================
    /// No envelope (or type registration) satisfies the request
    #[error("not found: {entity}")]
    NotFound {
        /// Description of what was looked up
        entity: String,
    },

    // ==================== Write conflicts ====================
    /// The same identity was written twice in one transaction
    #[error("duplicate write in one transaction: {entity}")]
    DuplicateWrite {
        /// The identity written twice
        entity: String,
    },

    /// Stale write or immutability violation
    ///
    /// The caller must re-read and retry; nothing is retried automatically.
    #[error("failed update: {reason}")]
    FailedUpdate {
        /// Why the update was refused
        reason: String,
    },

    // ==================== Type definition ====================
    /// An identity field is not a field (or fixed attribute) of the type
    #[error("identity field '{field}' is not a field of {type_tag}")]
    MissingIdentityField {
        /// Type being defined or read
        type_tag: String,
        /// The missing field
        field: String,
    },

    /// Identity defined twice in a type's ancestry
    #[error("duplicate identity definition for {type_tag}: {reason}")]
    DuplicateIdentityDefinition {
        /// Type being defined
        type_tag: String,
        /// Which definitions collide
        reason: String,
    },

    /// A field's shape cannot be serialized unambiguously
    #[error("unsupported shape for field '{field}': {reason}")]
    UnsupportedFieldShape {
        /// Field name
        field: String,
        /// Why the shape was rejected
        reason: String,
    },

    /// A type tag was already permanently registered
    #[error("type already registered: {type_tag}")]
    DuplicateRegistration {
        /// The duplicated tag
        type_tag: String,
    },

    /// A declared base type is not registered
    #[error("base type {base} of {type_tag} is not registered")]
    UnknownBase {
        /// Type being defined
        type_tag: String,
        /// The missing base
        base: String,
    },

    /// A field uses a reserved wire name
    #[error("field '{field}' of {type_tag} uses a reserved name")]
    ReservedField {
        /// Type being defined
        type_tag: String,
        /// The offending field
        field: String,
    },

    // ==================== Typing ====================
    /// A discriminator is absent or cannot be resolved to a registered type
    #[error("unresolvable type {}: {reason}", .type_tag.as_deref().unwrap_or("<missing>"))]
    UnresolvableType {
        /// The discriminator, if one was present
        type_tag: Option<String>,
        /// Why resolution failed
        reason: String,
    },

    /// The type has no identity and cannot be stored or read directly
    #[error("type {type_tag} is not persistable")]
    NotPersistable {
        /// The offending type
        type_tag: String,
    },

    /// Temporary types are not accepted by this store
    #[error("cannot persist temporary type {type_tag}")]
    TemporaryType {
        /// The offending type
        type_tag: String,
    },

    /// A copy would change an identity field
    #[error("cannot change identity field '{field}' of {type_tag}")]
    IdentityChange {
        /// Record type
        type_tag: String,
        /// Identity field that would change
        field: String,
    },

    /// A value does not fit its declared shape
    #[error("invalid value at {path}: {reason}")]
    InvalidValue {
        /// Field path of the value
        path: String,
        /// Why the value was rejected
        reason: String,
    },

    // ==================== Transaction ====================
    /// Reads and writes may not be mixed in one transaction
    #[error("cannot mix reads and writes in one transaction ({pending} pending)")]
    MixedTransaction {
        /// The kind of request already pending
        pending: String,
    },

    /// A transaction scope is already open on this store
    #[error("transaction already active")]
    TransactionAlreadyActive,

    // ==================== System ====================
    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Error message
        message: String,
    },

    /// Invalid configuration
    #[error("config error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Unclassified backend error, wrapping the native message
    #[error("unknown error - native error was {message}")]
    Unknown {
        /// Native error rendered as text
        message: String,
    },
}

/// Classification of a [`VellumError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`VellumError::NotFound`]
    NotFound,
    /// See [`VellumError::DuplicateWrite`]
    DuplicateWrite,
    /// See [`VellumError::FailedUpdate`]
    FailedUpdate,
    /// Type definition errors (fatal at registration)
    Definition,
    /// See [`VellumError::UnresolvableType`]
    UnresolvableType,
    /// Caller supplied a value or type the operation cannot accept
    InvalidInput,
    /// Transaction misuse
    Transaction,
    /// Serialization or configuration problems
    Internal,
    /// See [`VellumError::Unknown`]
    Unknown,
}

impl VellumError {
    /// Not found for a logical object address
    pub fn object_not_found(identity_type: &str, identity_value: &str) -> Self {
        VellumError::NotFound {
            entity: format!("{}{}", identity_type, identity_value),
        }
    }

    /// Not found for a type tag
    pub fn type_not_found(type_tag: &str) -> Self {
        VellumError::NotFound {
            entity: format!("type {}", type_tag),
        }
    }

    /// Invalid value at a field path
    pub fn invalid_value(path: impl Into<String>, reason: impl Into<String>) -> Self {
        VellumError::InvalidValue {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Unresolvable discriminator
    pub fn unresolvable(type_tag: Option<&str>, reason: impl Into<String>) -> Self {
        VellumError::UnresolvableType {
            type_tag: type_tag.map(str::to_string),
            reason: reason.into(),
        }
    }

    /// Unknown error wrapping a native error
    pub fn unknown(native: impl std::fmt::Display) -> Self {
        VellumError::Unknown {
            message: native.to_string(),
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            VellumError::NotFound { .. } => ErrorKind::NotFound,
            VellumError::DuplicateWrite { .. } => ErrorKind::DuplicateWrite,
            VellumError::FailedUpdate { .. } => ErrorKind::FailedUpdate,
            VellumError::MissingIdentityField { .. }
            | VellumError::DuplicateIdentityDefinition { .. }
            | VellumError::UnsupportedFieldShape { .. }
            | VellumError::DuplicateRegistration { .. }
            | VellumError::UnknownBase { .. }
            | VellumError::ReservedField { .. } => ErrorKind::Definition,
            VellumError::UnresolvableType { .. } => ErrorKind::UnresolvableType,
            VellumError::NotPersistable { .. }
            | VellumError::TemporaryType { .. }
            | VellumError::IdentityChange { .. }
            | VellumError::InvalidValue { .. } => ErrorKind::InvalidInput,
            VellumError::MixedTransaction { .. } | VellumError::TransactionAlreadyActive => {
                ErrorKind::Transaction
            }
            VellumError::Serialization { .. } | VellumError::Config { .. } => ErrorKind::Internal,
            VellumError::Unknown { .. } => ErrorKind::Unknown,
        }
    }

    /// True for `NotFound`
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

impl From<serde_json::Error> for VellumError {
    fn from(e: serde_json::Error) -> Self {
        VellumError::Serialization {
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_not_found() {
        let err = VellumError::object_not_found("Outer", "[\"outer\"]");
        let msg = err.to_string();
        assert!(msg.contains("not found"));
        assert!(msg.contains("Outer"));
    }

    #[test]
    fn test_error_display_unresolvable_without_tag() {
        let err = VellumError::unresolvable(None, "no discriminator");
        assert!(err.to_string().contains("<missing>"));
    }

    #[test]
    fn test_error_display_unknown_wraps_native() {
        let err = VellumError::unknown("disk I/O error");
        assert!(err.to_string().contains("disk I/O error"));
        assert_eq!(err.kind(), ErrorKind::Unknown);
    }

    #[test]
    fn test_kind_classification() {
        assert_eq!(
            VellumError::DuplicateWrite { entity: "x".into() }.kind(),
            ErrorKind::DuplicateWrite
        );
        assert_eq!(
            VellumError::FailedUpdate { reason: "x".into() }.kind(),
            ErrorKind::FailedUpdate
        );
        assert_eq!(
            VellumError::MissingIdentityField {
                type_tag: "T".into(),
                field: "f".into()
            }
            .kind(),
            ErrorKind::Definition
        );
        assert_eq!(
            VellumError::TransactionAlreadyActive.kind(),
            ErrorKind::Transaction
        );
    }

    #[test]
    fn test_serde_round_trip() {
        let err = VellumError::FailedUpdate {
            reason: "stale write".into(),
        };
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("\"kind\":\"failed_update\""));
        let back: VellumError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, err);

        let json = serde_json::to_string(&VellumError::TransactionAlreadyActive).unwrap();
        let back: VellumError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, VellumError::TransactionAlreadyActive);
    }

    #[test]
    fn test_from_serde_json() {
        let result: std::result::Result<serde_json::Value, _> = serde_json::from_str("{");
        let err: VellumError = result.unwrap_err().into();
        assert!(matches!(err, VellumError::Serialization { .. }));
    }
}
