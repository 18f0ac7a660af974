//! Core types for Vellum
//!
//! This crate defines the foundational types shared by every layer:
//! - Error: the normalized error taxonomy (`VellumError`, `ErrorKind`)
//! - Timestamp: microsecond instants, with `Timestamp::MAX` as "unbounded"
//! - VersionInfo: the hidden bitemporal bookkeeping carried by records
//! - ObjectKey / IdentityValue: the address of a logical object
//! - Wire types: `ReadRequest`, `WriteRequest`, `WriteBatch`, `Envelope`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod contract;
pub mod error;
pub mod wire;

pub use contract::{AsOf, IdentityValue, ObjectKey, Timestamp, VersionInfo};
pub use error::{ErrorKind, Result, VellumError};
pub use wire::{Envelope, ReadRequest, WriteBatch, WriteRequest};

/// Reserved wire key carrying a record's concrete type tag
pub const TYPE_KEY: &str = "t_";
