//! SQLite storage for Vellum
//!
//! This crate implements the persistent backend:
//! - SqliteBackend: envelopes, transactions and provisioned types in SQLite
//! - SqliteConfig: file location and busy timeout
//! - normalize: native constraint failures mapped onto store error kinds
//!
//! Reads resolve bitemporal bounds with a window function over each
//! object's history; writes allocate one transaction row per batch with a
//! strictly increasing entry time.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
mod schema;
pub mod sqlite;

pub use config::SqliteConfig;
pub use error::normalize;
pub use sqlite::SqliteBackend;
