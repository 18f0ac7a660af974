//! Vellum server: exposes a SQLite object database over HTTP.
//!
//! ```text
//! vellum-server --db objects.db --bind 0.0.0.0:8000 --check-schema
//! vellum-server --cache
//! ```

mod commands;

use std::path::Path;
use std::process;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;
use vellum_engine::Backend;
use vellum_storage::{SqliteBackend, SqliteConfig};
use vellum_wire::ServerConfig;

use commands::build_cli;

fn main() {
    let matches = build_cli().get_matches();

    let filter = matches
        .get_one::<String>("log")
        .map(|s| s.as_str())
        .unwrap_or("info");
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let backend = match open_database(&matches) {
        Ok(backend) => backend,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };

    let bind = matches
        .get_one::<String>("bind")
        .map(|s| s.as_str())
        .unwrap_or("127.0.0.1:8000");
    let config = ServerConfig::default().with_schema_check(matches.get_flag("check-schema"));

    if let Err(e) = run(bind, backend, config) {
        eprintln!("Server failed: {}", e);
        process::exit(1);
    }
}

fn open_database(matches: &clap::ArgMatches) -> Result<Arc<dyn Backend>, String> {
    let backend = if matches.get_flag("cache") {
        SqliteBackend::in_memory().map_err(|e| format!("Failed to open cache database: {}", e))?
    } else if let Some(config) = matches.get_one::<String>("config") {
        let config = SqliteConfig::from_file(Path::new(config)).map_err(|e| e.to_string())?;
        SqliteBackend::from_config(&config).map_err(|e| format!("Failed to open database: {}", e))?
    } else {
        let path = matches
            .get_one::<String>("db")
            .map(|s| s.as_str())
            .unwrap_or("vellum.db");
        SqliteBackend::open(path).map_err(|e| format!("Failed to open database: {}", e))?
    };
    info!(target: "vellum::wire", location = backend.location(), "Database ready");
    Ok(Arc::new(backend))
}

fn run(bind: &str, backend: Arc<dyn Backend>, config: ServerConfig) -> vellum_core::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(vellum_core::VellumError::unknown)?;
    runtime.block_on(async {
        let listener = tokio::net::TcpListener::bind(bind)
            .await
            .map_err(vellum_core::VellumError::unknown)?;
        let state = Arc::new(vellum_wire::ServerState::new(backend, config));
        let shutdown = async {
            let _ = tokio::signal::ctrl_c().await;
        };
        vellum_wire::serve(listener, state, shutdown).await
    })
}
