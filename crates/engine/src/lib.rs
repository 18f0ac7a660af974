//! Store engine for Vellum
//!
//! This crate turns typed records into batched backend calls:
//! - ObjectStore: implicit and explicit transactions, pending results
//! - Backend: the storage abstraction, plus an in-memory implementation
//! - StoreConfig: `vellum.toml` settings and audit identity overrides
//!
//! The engine never talks to a database directly; `vellum-storage` and
//! `vellum-wire` provide the persistent and remote backends.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod audit;
pub mod backend;
pub mod config;
pub mod memory;
pub mod pending;
pub mod store;

pub use audit::AuditIdentity;
pub use backend::{select_latest, Backend};
pub use config::{StoreConfig, CONFIG_FILE_NAME};
pub use memory::{MemoryBackend, TransactionRecord};
pub use pending::Pending;
pub use store::{ObjectStore, TransactionScope};
