//! HTTP protocol shared by server and client
//!
//! Bodies are JSON. Successful calls answer `200` with a list of envelopes;
//! failures answer with the serialized [`VellumError`] and a status derived
//! from its kind.

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use vellum_core::{ErrorKind, ReadRequest, VellumError};

/// Route of read batches
pub const READ_PATH: &str = "/read";
/// Route of write batches
pub const WRITE_PATH: &str = "/write";
/// Route of schema registration
pub const REGISTER_TYPE_PATH: &str = "/register_type";

/// Body of `POST /read`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadBatch {
    /// Read groups executed in one snapshot
    pub reads: Vec<ReadRequest>,
}

/// Body of `POST /register_type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterType {
    /// Concrete type tag
    pub name: String,
    /// Schema produced by `vellum_model::schema::schema`
    pub schema: Json,
}

/// HTTP status for an error
pub fn status_for(error: &VellumError) -> u16 {
    match error.kind() {
        ErrorKind::NotFound => 404,
        ErrorKind::DuplicateWrite | ErrorKind::FailedUpdate => 409,
        ErrorKind::Definition
        | ErrorKind::UnresolvableType
        | ErrorKind::InvalidInput
        | ErrorKind::Transaction => 400,
        ErrorKind::Internal | ErrorKind::Unknown => 500,
    }
}
