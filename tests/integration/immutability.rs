//! Content-addressed records are written once

use crate::common::*;
use vellum::{ErrorKind, Value};

#[test]
fn test_second_write_is_rejected() {
    let registry = registry();
    let store = sqlite_store(&registry);

    let blob = registry.builder("Blob").unwrap().set("data", "payload").build().unwrap();
    write(&store, &blob, false);
    let hash = blob.content_hash().to_hex();
    assert_eq!(blob.identity_values().unwrap(), vec![serde_json::Value::String(hash.clone())]);

    // Same instance again, as a head write or as a correction.
    assert_eq!(store.write(&blob, false).unwrap_err().kind(), ErrorKind::FailedUpdate);
    assert_eq!(store.write(&blob, true).unwrap_err().kind(), ErrorKind::FailedUpdate);

    // A fresh instance with the same content collides in the backend.
    let twin = registry.builder("Blob").unwrap().set("data", "payload").build().unwrap();
    let err = store.write(&twin, false).unwrap().wait().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FailedUpdate);

    assert_eq!(store.backend().transactions().unwrap().len(), 1);
    let loaded = read(&store, "Blob", &hash).unwrap();
    assert_eq!(loaded, blob);
}

#[test]
fn test_hash_lookup_is_case_insensitive() {
    let registry = registry();
    let store = memory_store(&registry);

    let blob = registry.builder("Blob").unwrap().set("data", "x").build().unwrap();
    write(&store, &blob, false);
    let upper = blob.content_hash().to_hex().to_uppercase();
    let loaded = store.read("Blob", &[Value::from(upper)]).unwrap().wait().unwrap();
    assert_eq!(loaded.content_hash(), blob.content_hash());
}
