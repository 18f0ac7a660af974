//! Shared fixtures for integration tests
//!
//! Every test builds its own registry so tests stay independent of the
//! process-wide one and of each other.

#![allow(dead_code)]

use std::sync::Arc;
use vellum::{
    Backend, MemoryBackend, ObjectStore, Record, SqliteBackend, StoreConfig, TypeDefinition, TypeRegistry,
    Value,
};

/// Registry with the container hierarchy used across tests
///
/// `Container3` is registered after `Nested`, so it is not a member of
/// `Nested.container`.
pub fn registry() -> Arc<TypeRegistry> {
    let registry = TypeRegistry::new();
    let definitions = [
        TypeDefinition::new("Named").field("name", "str").derived_identity(["name"]),
        TypeDefinition::new("Container")
            .base("Named")
            .field_with_default("contents", "dict[str, date | str | float | int]", Value::Map(Default::default())),
        TypeDefinition::new("Container2").base("Container").field_with_default("rank", "int", 0),
        TypeDefinition::new("Nested")
            .base("Named")
            .field("container", "Optional[Subclass[Container]]")
            .field_with_default("value", "int", 0),
        TypeDefinition::new("Outer")
            .base("Named")
            .field("the_nested", "Nested")
            .field_with_default("the_version", "int", 0),
        TypeDefinition::new("Container3").base("Container2").field("date", "date"),
        TypeDefinition::new("Blob").field("data", "str").content_addressed(),
    ];
    for definition in definitions {
        registry.register(definition, false).unwrap();
    }
    Arc::new(registry)
}

/// Store configuration with a fixed audit identity
pub fn config() -> StoreConfig {
    StoreConfig::default()
        .with_username("tester")
        .with_hostname("ci")
        .with_default_comment("integration")
}

pub fn memory_store(registry: &Arc<TypeRegistry>) -> ObjectStore<MemoryBackend> {
    ObjectStore::with_registry(MemoryBackend::new(), Arc::clone(registry), config()).unwrap()
}

pub fn sqlite_store(registry: &Arc<TypeRegistry>) -> ObjectStore<SqliteBackend> {
    ObjectStore::with_registry(SqliteBackend::temporary().unwrap(), Arc::clone(registry), config()).unwrap()
}

pub fn container2(registry: &TypeRegistry, name: &str, rank: i64) -> Record {
    registry
        .builder("Container2")
        .unwrap()
        .set("name", name)
        .set("contents", Value::map([("foo", Value::Int(1))]))
        .set("rank", rank)
        .build()
        .unwrap()
}

pub fn nested(registry: &TypeRegistry, name: &str, value: i64) -> Record {
    registry
        .builder("Nested")
        .unwrap()
        .set("name", name)
        .set("container", container2(registry, "container", 1))
        .set("value", value)
        .build()
        .unwrap()
}

pub fn outer(registry: &TypeRegistry, name: &str, value: i64) -> Record {
    registry
        .builder("Outer")
        .unwrap()
        .set("name", name)
        .set("the_nested", nested(registry, "n", value))
        .build()
        .unwrap()
}

/// Write one record in its own transaction and wait for the ack
pub fn write<B: Backend>(store: &ObjectStore<B>, record: &Record, as_of_effective_time: bool) {
    store.write(record, as_of_effective_time).unwrap().wait().unwrap();
}

pub fn read<B: Backend>(store: &ObjectStore<B>, type_tag: &str, name: &str) -> vellum::Result<Record> {
    store.read(type_tag, &[Value::from(name)])?.wait()
}
