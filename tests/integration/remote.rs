//! Stores over the HTTP facade

use crate::common::*;
use std::sync::Arc;
use vellum::{AsOf, HttpBackend, ObjectStore, ServerConfig, ServerHandle, SqliteBackend, Timestamp, Value};

#[test]
fn test_remote_round_trip() {
    let registry = registry();
    let server = ServerHandle::start(
        "127.0.0.1:0",
        Arc::new(SqliteBackend::in_memory().unwrap()),
        ServerConfig::default().with_schema_check(true),
    )
    .unwrap();

    let client = HttpBackend::new(server.url()).unwrap();
    client.register_type(&registry.resolve("Outer").unwrap()).unwrap();
    let store = ObjectStore::with_registry(client, Arc::clone(&registry), config()).unwrap();

    let original = outer(&registry, "remote", 42);
    write(&store, &original, false);
    let corrected = original.at_path("the_nested.value").set(43).unwrap();
    write(&store, &corrected, true);

    let latest = read(&store, "Outer", "remote").unwrap();
    assert_eq!(latest, corrected);
    assert_eq!(latest.version(), corrected.version());

    let as_of = AsOf::new(Timestamp::MAX, original.version().entry_time);
    let known = store
        .read_as_of("Outer", &[Value::from("remote")], as_of)
        .unwrap()
        .wait()
        .unwrap();
    assert_eq!(known, original);

    // Only Outer has a schema on the server.
    let err = store
        .write(&container2(&registry, "c", 1), false)
        .unwrap()
        .wait()
        .unwrap_err();
    assert!(matches!(err, vellum::VellumError::UnresolvableType { .. }));
}
