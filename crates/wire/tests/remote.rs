//! End-to-end tests of the remote facade
//!
//! Each test starts a server on an ephemeral port in a background runtime
//! and talks to it with the blocking client.

use std::sync::Arc;
use vellum_core::{AsOf, IdentityValue, ReadRequest, Timestamp, VellumError, WriteBatch, WriteRequest};
use vellum_engine::{Backend, MemoryBackend, ObjectStore, StoreConfig};
use vellum_model::{TypeDefinition, TypeRegistry, Value};
use vellum_storage::SqliteBackend;
use vellum_wire::{HttpBackend, ServerConfig, ServerHandle};

fn start(backend: Arc<dyn Backend>, config: ServerConfig) -> (ServerHandle, HttpBackend) {
    let server = ServerHandle::start("127.0.0.1:0", backend, config).unwrap();
    let client = HttpBackend::new(server.url()).unwrap();
    (server, client)
}

fn doc_write(id: &str, contents: &str, effective_version: u64) -> WriteRequest {
    WriteRequest {
        identity_type: "Doc".into(),
        concrete_type: "Doc".into(),
        identity_value: IdentityValue::from_canonical(format!("[\"{}\"]", id)),
        contents: contents.to_string(),
        effective_version,
        entry_version: 1,
        effective_time: Timestamp::MAX,
        entry_time: Timestamp::MAX,
    }
}

fn batch(writes: Vec<WriteRequest>) -> WriteBatch {
    WriteBatch {
        writes,
        username: "remote".into(),
        hostname: "client".into(),
        comment: String::new(),
    }
}

fn registry() -> Arc<TypeRegistry> {
    let registry = TypeRegistry::new();
    registry
        .register(
            TypeDefinition::new("Doc")
                .field("id", "str")
                .field("body", "str")
                .identity(["id"]),
            false,
        )
        .unwrap();
    registry
        .register(TypeDefinition::new("Draft").field("id", "str").identity(["id"]), true)
        .unwrap();
    Arc::new(registry)
}

#[test]
fn test_raw_round_trip() {
    let (_server, client) = start(Arc::new(MemoryBackend::new()), ServerConfig::default());

    let contents = r#"{"body":"hi","id":"a","t_":"Doc"}"#;
    let stored = client.execute_writes(&batch(vec![doc_write("a", contents, 1)])).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].transaction_id, 1);
    assert_eq!(stored[0].effective_time, stored[0].entry_time);

    let mut request = ReadRequest::new("Doc", AsOf::LATEST);
    request.identity_values.push(IdentityValue::from_canonical("[\"a\"]"));
    let found = client.execute_reads(&[request]).unwrap();
    assert_eq!(found, stored);
}

#[test]
fn test_errors_cross_the_wire() {
    let backend: Arc<dyn Backend> = Arc::new(SqliteBackend::in_memory().unwrap());
    let (_server, client) = start(backend, ServerConfig::default());

    let contents = r#"{"body":"hi","id":"a","t_":"Doc"}"#;
    client.execute_writes(&batch(vec![doc_write("a", contents, 1)])).unwrap();

    let err = client
        .execute_writes(&batch(vec![doc_write("a", contents, 1)]))
        .unwrap_err();
    assert!(matches!(err, VellumError::FailedUpdate { .. }));

    let err = client
        .execute_writes(&batch(vec![doc_write("b", contents, 1), doc_write("b", contents, 2)]))
        .unwrap_err();
    assert!(matches!(err, VellumError::DuplicateWrite { .. }));
}

#[test]
fn test_schema_checking() {
    let (server, client) = start(
        Arc::new(MemoryBackend::new()),
        ServerConfig::default().with_schema_check(true),
    );
    let registry = registry();

    let contents = r#"{"body":"hi","id":"a","t_":"Doc"}"#;
    let err = client
        .execute_writes(&batch(vec![doc_write("a", contents, 1)]))
        .unwrap_err();
    assert!(matches!(err, VellumError::UnresolvableType { .. }));

    client.register_type(&registry.resolve("Doc").unwrap()).unwrap();
    assert!(server.state().has_schema("Doc"));

    let err = client
        .execute_writes(&batch(vec![doc_write("a", r#"{"id":"a","t_":"Doc"}"#, 1)]))
        .unwrap_err();
    match err {
        VellumError::InvalidValue { reason, .. } => assert!(reason.contains("body")),
        other => panic!("unexpected {:?}", other),
    }

    client.execute_writes(&batch(vec![doc_write("a", contents, 1)])).unwrap();
}

#[test]
fn test_store_over_http() {
    let (_server, client) = start(Arc::new(MemoryBackend::new()), ServerConfig::default());
    let registry = registry();
    let store = ObjectStore::with_registry(client, Arc::clone(&registry), StoreConfig::default()).unwrap();

    let doc = registry
        .builder("Doc")
        .unwrap()
        .set("id", "a")
        .set("body", "over the wire")
        .build()
        .unwrap();
    store.write(&doc, false).unwrap().wait().unwrap();
    assert_eq!(doc.effective_version(), 1);

    let loaded = store.read("Doc", &[Value::from("a")]).unwrap().wait().unwrap();
    assert_eq!(loaded, doc);
    assert_eq!(loaded.version(), doc.version());

    let missing = store.read("Doc", &[Value::from("nope")]).unwrap().wait().unwrap_err();
    assert!(missing.is_not_found());

    let draft = registry.builder("Draft").unwrap().set("id", "d").build().unwrap();
    assert!(matches!(
        store.write(&draft, false).unwrap_err(),
        VellumError::TemporaryType { .. }
    ));
}

#[test]
fn test_unreachable_server_is_unknown() {
    let port = {
        let server = ServerHandle::start("127.0.0.1:0", Arc::new(MemoryBackend::new()), ServerConfig::default()).unwrap();
        server.addr().port()
    };
    let client = HttpBackend::new(format!("http://127.0.0.1:{}", port)).unwrap();
    let err = client.execute_reads(&[]).unwrap_err();
    assert!(matches!(err, VellumError::Unknown { .. }));
}
