//! Blocking HTTP client backend

use crate::protocol::{ReadBatch, RegisterType, READ_PATH, REGISTER_TYPE_PATH, WRITE_PATH};
use reqwest::blocking::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;
use vellum_core::{Envelope, ReadRequest, Result, VellumError, WriteBatch};
use vellum_engine::Backend;
use vellum_model::{schema, TypeDescriptor};

/// Backend forwarding batches to a remote facade
///
/// Stores over this backend refuse temporary types: the server is shared
/// and outlives the client's type definitions.
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    /// Client for the server at `base_url`, e.g. `http://127.0.0.1:8000`
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(30))
    }

    /// Client with a request timeout
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(VellumError::unknown)?;
        Ok(HttpBackend {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Server base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Publish the schema of `descriptor` under its type tag
    pub fn register_type(&self, descriptor: &TypeDescriptor) -> Result<()> {
        self.register_schema(descriptor.type_tag(), schema::schema(descriptor))
    }

    /// Publish a raw schema
    pub fn register_schema(&self, name: &str, schema: serde_json::Value) -> Result<()> {
        let body = RegisterType {
            name: name.to_string(),
            schema,
        };
        let response = self.send(REGISTER_TYPE_PATH, &body)?;
        check(response).map(|_| ())
    }

    fn send<T: Serialize>(&self, path: &str, body: &T) -> Result<Response> {
        let url = format!("{}{}", self.base_url, path);
        self.client
            .post(&url)
            .json(body)
            .send()
            .map_err(VellumError::unknown)
    }

    fn call<T: Serialize, R: DeserializeOwned>(&self, path: &str, body: &T) -> Result<R> {
        let response = check(self.send(path, body)?)?;
        response.json::<R>().map_err(|e| VellumError::Serialization {
            message: e.to_string(),
        })
    }
}

/// Pass a 2xx response through; turn anything else into an error
///
/// The body of an error response is the serialized error when it comes from
/// a facade; any other body is wrapped as `Unknown`.
fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().unwrap_or_default();
    debug!(target: "vellum::wire", status = status.as_u16(), "Remote call failed");
    Err(serde_json::from_str::<VellumError>(&text).unwrap_or_else(|_| VellumError::Unknown {
        message: format!("HTTP {}: {}", status, text),
    }))
}

impl Backend for HttpBackend {
    fn execute_reads(&self, reads: &[ReadRequest]) -> Result<Vec<Envelope>> {
        let body = ReadBatch { reads: reads.to_vec() };
        self.call(READ_PATH, &body)
    }

    fn execute_writes(&self, batch: &WriteBatch) -> Result<Vec<Envelope>> {
        self.call(WRITE_PATH, batch)
    }

    fn allows_temporary_types(&self) -> bool {
        false
    }

    fn name(&self) -> &str {
        "http"
    }
}

impl std::fmt::Debug for HttpBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBackend").field("base_url", &self.base_url).finish()
    }
}
