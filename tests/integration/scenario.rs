//! Write, correct, then read back at three points in bitemporal time

use crate::common::*;
use vellum::{AsOf, Backend, ObjectStore, Timestamp, Value};

fn correction_scenario<B: Backend>(store: &ObjectStore<B>) {
    let registry = store.registry();
    let original = outer(registry, "outer", 42);
    write(store, &original, false);
    let t = original.version().effective_time;
    let e1 = original.version().entry_time;

    let corrected = original.at(["the_nested", "value"]).set(43).unwrap();
    write(store, &corrected, true);
    assert_eq!(corrected.version().effective_time, t);
    assert!(corrected.version().entry_time > e1);

    let key = [Value::from("outer")];

    let before_correction = store
        .read_as_of("Outer", &key, AsOf::new(Timestamp::MAX, e1))
        .unwrap()
        .wait()
        .unwrap();
    assert_eq!(before_correction.at_path("the_nested.value").get().unwrap(), &Value::Int(42));
    assert_eq!(before_correction, original);

    let latest = store.read("Outer", &key).unwrap().wait().unwrap();
    assert_eq!(latest.at_path("the_nested.value").get().unwrap(), &Value::Int(43));
    assert_eq!(latest.effective_version(), 1);
    assert_eq!(latest.entry_version(), 2);

    let err = store
        .read_as_of("Outer", &key, AsOf::effective(t.prev()))
        .unwrap()
        .wait()
        .unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_correction_scenario_memory() {
    let registry = registry();
    correction_scenario(&memory_store(&registry));
}

#[test]
fn test_correction_scenario_sqlite() {
    let registry = registry();
    correction_scenario(&sqlite_store(&registry));
}

#[test]
fn test_nested_container_round_trips() {
    let registry = registry();
    let store = sqlite_store(&registry);
    let record = outer(&registry, "outer", 1);
    write(&store, &record, false);

    let loaded = read(&store, "Outer", "outer").unwrap();
    assert_eq!(loaded, record);
    let container = loaded.at_path("the_nested.container").get().unwrap();
    assert_eq!(container.as_record().unwrap().type_tag(), "Container2");
}
