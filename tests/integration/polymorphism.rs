//! Subtype reads and late-registered union members

use crate::common::*;
use chrono::NaiveDate;
use vellum::{Codec, Expected, Value, VellumError};

#[test]
fn test_load_via_base() {
    let registry = registry();
    let store = sqlite_store(&registry);

    let c3 = registry
        .builder("Container3")
        .unwrap()
        .set("name", "container3")
        .set("contents", Value::map([("foo", Value::Int(1))]))
        .set("rank", 2)
        .set("date", NaiveDate::from_ymd_opt(2024, 6, 1).unwrap())
        .build()
        .unwrap();
    write(&store, &c3, false);

    let loaded = read(&store, "Container", "container3").unwrap();
    assert_eq!(loaded.type_tag(), "Container3");
    assert_eq!(loaded, c3);

    let via_middle = read(&store, "Container2", "container3").unwrap();
    assert_eq!(via_middle, c3);
}

#[test]
fn test_read_as_unrelated_subtype_is_not_found() {
    let registry = registry();
    let store = memory_store(&registry);
    write(&store, &container2(&registry, "c", 1), false);

    let err = read(&store, "Container3", "c").unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_union_member_registered_late() {
    let registry = registry();

    let c3 = registry
        .builder("Container3")
        .unwrap()
        .set("name", "late")
        .set("date", NaiveDate::from_ymd_opt(2024, 6, 1).unwrap())
        .build()
        .unwrap();
    let err = registry
        .builder("Nested")
        .unwrap()
        .set("name", "n")
        .set("container", c3)
        .build()
        .unwrap_err();
    assert!(matches!(err, VellumError::InvalidValue { .. }));

    let text = r#"{"t_":"Nested","name":"n","container":{"t_":"Container3","name":"late","date":"2024-06-01"}}"#;
    let err = Codec::new(&registry).loads(text, Expected::Any).unwrap_err();
    assert!(matches!(err, VellumError::UnresolvableType { type_tag: Some(ref t), .. } if t == "Container3"));
}

#[test]
fn test_contents_union_round_trip() {
    let registry = registry();
    let store = sqlite_store(&registry);

    let contents = Value::map([
        ("day", Value::Date(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap())),
        ("text", Value::from("2024-01-02")),
        ("ratio", Value::Float(0.25)),
        ("count", Value::Int(7)),
    ]);
    let record = registry
        .builder("Container")
        .unwrap()
        .set("name", "mixed")
        .set("contents", contents.clone())
        .build()
        .unwrap();
    write(&store, &record, false);

    let loaded = read(&store, "Container", "mixed").unwrap();
    assert_eq!(loaded.get("contents"), Some(&contents));
}
