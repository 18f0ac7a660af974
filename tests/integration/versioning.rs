//! Head writes, corrections and identity stability

use crate::common::*;
use proptest::prelude::*;
use vellum::{AsOf, Value, VellumError};

#[test]
fn test_head_writes_number_versions_in_order() {
    let registry = registry();
    let store = sqlite_store(&registry);

    let mut record = outer(&registry, "outer", 0);
    let mut times = Vec::new();
    for n in 1..=5i64 {
        if n > 1 {
            record = record.with_field("the_version", n).unwrap();
        }
        write(&store, &record, false);
        assert_eq!(record.effective_version(), n as u64);
        assert_eq!(record.entry_version(), 1);
        times.push(record.version().effective_time);
    }
    assert!(times.windows(2).all(|w| w[0] < w[1]));

    // Every earlier fact is still readable at its own effective time.
    for (i, t) in times.iter().enumerate() {
        let old = store
            .read_as_of("Outer", &[Value::from("outer")], AsOf::effective(*t))
            .unwrap()
            .wait()
            .unwrap();
        assert_eq!(old.effective_version(), i as u64 + 1);
    }
}

#[test]
fn test_update_then_correct_old_version() {
    let registry = registry();
    let store = memory_store(&registry);

    let v1 = outer(&registry, "outer", 0);
    write(&store, &v1, false);
    let v2 = v1.with_field("the_version", 1).unwrap();
    write(&store, &v2, false);

    let old = store
        .read_as_of("Outer", &[Value::from("outer")], AsOf::effective(v1.version().effective_time))
        .unwrap()
        .wait()
        .unwrap();
    assert_eq!(old, v1);

    let v11 = old.with_field("the_version", 11).unwrap();
    write(&store, &v11, true);

    let as_of = AsOf::effective(v1.version().effective_time);
    let corrected = store.read_as_of("Outer", &[Value::from("outer")], as_of).unwrap().wait().unwrap();
    assert_eq!(corrected, v11);
    assert_eq!(corrected.effective_version(), 1);
    assert_eq!(corrected.entry_version(), 2);

    let as_of = as_of.with_entry_time(v1.version().entry_time);
    let original = store.read_as_of("Outer", &[Value::from("outer")], as_of).unwrap().wait().unwrap();
    assert_eq!(original, v1);

    // The correction does not touch the later fact.
    let latest = read(&store, "Outer", "outer").unwrap();
    assert_eq!(latest, v2);
}

#[test]
fn test_identity_is_stable_across_versions() {
    let registry = registry();
    let store = memory_store(&registry);

    let v1 = outer(&registry, "outer", 0);
    write(&store, &v1, false);
    let v2 = v1.with_field("the_version", 2).unwrap();
    write(&store, &v2, false);

    let history = store.backend().history(&v1.key().unwrap());
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|e| e.key() == v1.key().unwrap()));
    assert_ne!(history[0].effective_version, history[1].effective_version);

    let err = v1.with_field("name", "renamed").unwrap_err();
    assert!(matches!(err, VellumError::IdentityChange { .. }));
}

#[test]
fn test_subtypes_share_their_identity_type() {
    let registry = registry();
    let store = memory_store(&registry);

    let first = container2(&registry, "shared", 1);
    write(&store, &first, false);
    let err = {
        let _txn = store.transaction("clash").unwrap();
        store.write(&first.with_field("rank", 3).unwrap(), false).unwrap();
        let plain = registry.builder("Container").unwrap().set("name", "shared").build().unwrap();
        store.write(&plain, false).unwrap_err()
    };
    assert!(matches!(err, VellumError::DuplicateWrite { .. }));

    let latest = read(&store, "Container", "shared").unwrap();
    assert_eq!(latest.type_tag(), "Container2");
    assert_eq!(latest.get("rank"), Some(&Value::Int(3)));
    assert_eq!(latest.effective_version(), 2);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn latest_read_sees_last_head_write(values in proptest::collection::vec(any::<i64>(), 1..6)) {
        let registry = registry();
        let store = memory_store(&registry);

        let mut record = outer(&registry, "p", 0);
        for v in &values {
            record = record.with_field("the_version", *v).unwrap();
            write(&store, &record, false);
        }

        let latest = read(&store, "Outer", "p").unwrap();
        let expected = values.last().map(|v| Value::Int(*v));
        prop_assert_eq!(latest.get("the_version"), expected.as_ref());
        prop_assert_eq!(latest.effective_version(), values.len() as u64);
        prop_assert_eq!(latest.entry_version(), 1);
    }
}
