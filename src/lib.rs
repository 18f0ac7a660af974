//! Vellum - bitemporal object store for typed, polymorphic records
//!
//! Records are instances of registered types. Each logical object is
//! addressed by its identity type and identity value; every write adds an
//! immutable version with an effective time and an entry time, so any past
//! state can be read back as it was known at any past moment.
//!
//! # Quick Start
//!
//! ```ignore
//! use vellum::{ObjectStore, SqliteBackend, TypeDefinition, TypeRegistry, Value};
//!
//! TypeRegistry::global().register(
//!     TypeDefinition::new("Account").field("id", "str").field("owner", "str").identity(["id"]),
//!     false,
//! )?;
//!
//! let store = ObjectStore::new(SqliteBackend::temporary()?);
//! let account = TypeRegistry::global()
//!     .builder("Account")?
//!     .set("id", "acc-1")
//!     .set("owner", "ada")
//!     .build()?;
//! store.write(&account, false)?.wait()?;
//!
//! let loaded = store.read("Account", &[Value::from("acc-1")])?.wait()?;
//! ```
//!
//! # Architecture
//!
//! - `vellum-core`: errors, timestamps, version bookkeeping, wire shapes
//! - `vellum-model`: type registry, shapes, records, codec
//! - `vellum-engine`: object store, transactions, backend trait
//! - `vellum-storage`: SQLite backend
//! - `vellum-wire`: HTTP server and client backend

pub use vellum_core::{
    AsOf, Envelope, ErrorKind, IdentityValue, ObjectKey, ReadRequest, Result, Timestamp, VellumError,
    VersionInfo, WriteBatch, WriteRequest, TYPE_KEY,
};
pub use vellum_engine::{
    AuditIdentity, Backend, MemoryBackend, ObjectStore, Pending, StoreConfig, TransactionRecord,
    TransactionScope,
};
pub use vellum_model::{
    codec, schema, Codec, ContentHash, Expected, FieldShape, Record, RecordBuilder, TypeDefinition,
    TypeDescriptor, TypeProvider, TypeRegistry, Value,
};
pub use vellum_storage::{SqliteBackend, SqliteConfig};
pub use vellum_wire::{HttpBackend, ServerConfig, ServerHandle};
