//! Remote facade for Vellum
//!
//! - server: `axum` routes exposing any backend over HTTP
//! - client: `HttpBackend`, a blocking `reqwest` backend for stores
//! - protocol: shared bodies, routes and the error-to-status mapping

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod protocol;
pub mod server;

pub use client::HttpBackend;
pub use protocol::{status_for, ReadBatch, RegisterType};
pub use server::{router, serve, ApiError, ServerConfig, ServerHandle, ServerState};
