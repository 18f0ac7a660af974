//! HTTP server exposing a backend
//!
//! Handlers run backend calls on the blocking pool; a backend never sees an
//! async context.

use crate::protocol::{status_for, ReadBatch, RegisterType, READ_PATH, REGISTER_TYPE_PATH, WRITE_PATH};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use parking_lot::RwLock;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use vellum_core::{Envelope, Result, VellumError, WriteBatch};
use vellum_engine::Backend;
use vellum_model::schema::missing_required;

/// Server settings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerConfig {
    /// Reject writes of types without a registered schema, and contents
    /// missing a required property
    pub check_schema: bool,
}

impl ServerConfig {
    /// Enable or disable schema checking
    pub fn with_schema_check(mut self, check: bool) -> Self {
        self.check_schema = check;
        self
    }
}

/// Shared state of the handlers
pub struct ServerState {
    backend: Arc<dyn Backend>,
    schemas: RwLock<HashMap<String, JsonValue>>,
    config: ServerConfig,
}

impl ServerState {
    /// State over `backend`
    pub fn new(backend: Arc<dyn Backend>, config: ServerConfig) -> Self {
        ServerState {
            backend,
            schemas: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Whether a schema was registered for `name`
    pub fn has_schema(&self, name: &str) -> bool {
        self.schemas.read().contains_key(name)
    }

    fn check_writes(&self, batch: &WriteBatch) -> Result<()> {
        if !self.config.check_schema {
            return Ok(());
        }
        let schemas = self.schemas.read();
        for write in &batch.writes {
            let schema = schemas
                .get(&write.concrete_type)
                .ok_or_else(|| VellumError::unresolvable(Some(write.concrete_type.as_str()), "type is not registered with the server"))?;
            let contents: JsonValue = serde_json::from_str(&write.contents).map_err(|e| {
                VellumError::invalid_value(write.concrete_type.clone(), format!("contents are not JSON: {}", e))
            })?;
            let missing = missing_required(schema, &contents);
            if !missing.is_empty() {
                return Err(VellumError::invalid_value(
                    write.concrete_type.clone(),
                    format!("missing required properties: {}", missing.join(", ")),
                ));
            }
        }
        Ok(())
    }
}

/// Error answered by a handler
pub struct ApiError(VellumError);

impl From<VellumError> for ApiError {
    fn from(e: VellumError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(status_for(&self.0)).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.0)).into_response()
    }
}

async fn blocking<T, F>(f: F) -> std::result::Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result.map_err(ApiError),
        Err(e) => Err(ApiError(VellumError::unknown(e))),
    }
}

async fn handle_read(
    State(state): State<Arc<ServerState>>,
    Json(batch): Json<ReadBatch>,
) -> std::result::Result<Json<Vec<Envelope>>, ApiError> {
    debug!(target: "vellum::wire", groups = batch.reads.len(), "Read request");
    let backend = Arc::clone(&state.backend);
    let envelopes = blocking(move || backend.execute_reads(&batch.reads)).await?;
    Ok(Json(envelopes))
}

async fn handle_write(
    State(state): State<Arc<ServerState>>,
    Json(batch): Json<WriteBatch>,
) -> std::result::Result<Json<Vec<Envelope>>, ApiError> {
    debug!(target: "vellum::wire", writes = batch.writes.len(), username = %batch.username, "Write request");
    if let Err(e) = state.check_writes(&batch) {
        warn!(target: "vellum::wire", error = %e, "Rejected write batch");
        return Err(ApiError(e));
    }
    let backend = Arc::clone(&state.backend);
    let envelopes = blocking(move || backend.execute_writes(&batch)).await?;
    Ok(Json(envelopes))
}

async fn handle_register_type(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<RegisterType>,
) -> StatusCode {
    info!(target: "vellum::wire", name = %request.name, "Registered schema");
    state.schemas.write().insert(request.name, request.schema);
    StatusCode::OK
}

/// Routes of the remote facade
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route(READ_PATH, post(handle_read))
        .route(WRITE_PATH, post(handle_write))
        .route(REGISTER_TYPE_PATH, post(handle_register_type))
        .with_state(state)
}

/// Serve until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, state: Arc<ServerState>, shutdown: F) -> Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr().map_err(VellumError::unknown)?;
    info!(target: "vellum::wire", %addr, "Remote facade listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(VellumError::unknown)
}

/// A server running on its own thread and runtime
///
/// Stops when dropped.
pub struct ServerHandle {
    addr: SocketAddr,
    state: Arc<ServerState>,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl ServerHandle {
    /// Bind `addr` (port 0 picks a free port) and start serving `backend`
    pub fn start(addr: &str, backend: Arc<dyn Backend>, config: ServerConfig) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(VellumError::unknown)?;
        let listener = runtime
            .block_on(TcpListener::bind(addr))
            .map_err(VellumError::unknown)?;
        let local = listener.local_addr().map_err(VellumError::unknown)?;

        let state = Arc::new(ServerState::new(backend, config));
        let (tx, rx) = oneshot::channel::<()>();
        let served = Arc::clone(&state);
        let thread = std::thread::Builder::new()
            .name("vellum-wire".into())
            .spawn(move || {
                let stop = async {
                    let _ = rx.await;
                };
                if let Err(e) = runtime.block_on(serve(listener, served, stop)) {
                    warn!(target: "vellum::wire", error = %e, "Server stopped with an error");
                }
            })
            .map_err(VellumError::unknown)?;

        Ok(ServerHandle {
            addr: local,
            state,
            shutdown: Some(tx),
            thread: Some(thread),
        })
    }

    /// Bound address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Base URL for clients
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Handler state
    pub fn state(&self) -> &Arc<ServerState> {
        &self.state
    }

    /// Stop serving and wait for the server thread
    pub fn stop(mut self) {
        self.shutdown_now();
    }

    fn shutdown_now(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.shutdown_now();
    }
}
