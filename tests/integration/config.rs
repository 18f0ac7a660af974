//! Configuration files and audit rows

use crate::common::*;
use std::sync::Arc;
use tempfile::TempDir;
use vellum::{ObjectStore, SqliteBackend, SqliteConfig, StoreConfig};

#[test]
fn test_store_config_from_file_drives_audit() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("vellum.toml");
    std::fs::write(
        &path,
        "username = \"svc-batch\"\nhostname = \"batch-01\"\ndefault_comment = \"nightly\"\n",
    )
    .unwrap();
    let config = StoreConfig::from_file(&path).unwrap();

    let registry = registry();
    let backend = SqliteBackend::open(dir.path().join("objects.db")).unwrap();
    let store = ObjectStore::with_registry(backend, Arc::clone(&registry), config).unwrap();

    write(&store, &outer(&registry, "a", 1), false);
    {
        let txn = store.transaction("explicit").unwrap();
        store.write(&outer(&registry, "b", 1), false).unwrap();
        txn.commit();
    }

    let rows = store.backend().transactions().unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.username == "svc-batch" && r.hostname == "batch-01"));
    assert_eq!(rows[0].comment, "nightly");
    assert_eq!(rows[1].comment, "explicit");
}

#[test]
fn test_reopened_database_keeps_history() {
    let dir = TempDir::new().unwrap();
    let sqlite = SqliteConfig::file(dir.path().join("objects.db")).with_busy_timeout_ms(100);
    let registry = registry();

    let first = outer(&registry, "kept", 1);
    {
        let store = ObjectStore::with_registry(
            SqliteBackend::from_config(&sqlite).unwrap(),
            Arc::clone(&registry),
            config(),
        )
        .unwrap();
        write(&store, &first, false);
    }

    let backend = SqliteBackend::from_config(&sqlite).unwrap();
    assert_eq!(backend.min_entry_time(), first.version().entry_time);
    let store = ObjectStore::with_registry(backend, Arc::clone(&registry), config()).unwrap();
    let loaded = read(&store, "Outer", "kept").unwrap();
    assert_eq!(loaded, first);
    assert_eq!(loaded.version(), first.version());
}

#[test]
fn test_empty_override_is_rejected() {
    let registry = registry();
    let err = ObjectStore::with_registry(
        SqliteBackend::in_memory().unwrap(),
        registry,
        StoreConfig::default().with_username(" "),
    )
    .unwrap_err();
    assert!(matches!(err, vellum::VellumError::Config { .. }));
}
