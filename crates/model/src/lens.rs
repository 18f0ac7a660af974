//! Path updates
//!
//! `record.at(["the_nested", "container", "rank"]).set(2)` replaces a value
//! deep inside a record and returns a new root. Every enclosing record is
//! rebuilt with [`Record::with_field`], so identity fields stay immutable and
//! every replaced value is shape-checked. The root keeps its bookkeeping, so
//! the result can be written as the next version of the same object.
//!
//! Path segments name record fields or, inside a mapping, keys.

use crate::record::Record;
use crate::value::Value;
use vellum_core::{Result, VellumError};

/// A path into a record
#[derive(Debug, Clone)]
pub struct Lens<'a> {
    root: &'a Record,
    path: Vec<String>,
}

impl Record {
    /// Path from segments
    pub fn at<I, S>(&self, path: I) -> Lens<'_>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Lens {
            root: self,
            path: path.into_iter().map(Into::into).collect(),
        }
    }

    /// Path from a dotted string, e.g. `"the_nested.name"`
    pub fn at_path(&self, dotted: &str) -> Lens<'_> {
        self.at(dotted.split('.'))
    }
}

impl<'a> Lens<'a> {
    /// Current value at the path
    pub fn get(&self) -> Result<&'a Value> {
        let (first, rest) = self.split()?;
        let mut current = field_of(self.root, first, &self.dotted())?;
        for segment in rest {
            current = match current {
                Value::Record(record) => field_of(record, segment, &self.dotted())?,
                Value::Map(entries) => entries
                    .get(segment)
                    .ok_or_else(|| VellumError::invalid_value(self.dotted(), format!("no key '{}'", segment)))?,
                other => return Err(cannot_descend(&self.dotted(), other)),
            };
        }
        Ok(current)
    }

    /// New root with the value at the path replaced
    pub fn set(self, value: impl Into<Value>) -> Result<Record> {
        let dotted = self.dotted();
        let (first, rest) = self.split()?;
        set_in_record(self.root, first, rest, value.into(), &dotted)
    }

    fn split(&self) -> Result<(&String, &[String])> {
        self.path
            .split_first()
            .filter(|(first, _)| !first.is_empty())
            .ok_or_else(|| VellumError::invalid_value("", "empty path"))
    }

    fn dotted(&self) -> String {
        self.path.join(".")
    }
}

fn field_of<'r>(record: &'r Record, name: &str, path: &str) -> Result<&'r Value> {
    record.get(name).ok_or_else(|| {
        VellumError::invalid_value(path, format!("{} has no field '{}'", record.type_tag(), name))
    })
}

fn cannot_descend(path: &str, value: &Value) -> VellumError {
    VellumError::invalid_value(path, format!("cannot descend into {}", value.kind_name()))
}

fn set_in_record(record: &Record, name: &str, rest: &[String], value: Value, path: &str) -> Result<Record> {
    let current = field_of(record, name, path)?;
    let replaced = replace(current, rest, value, path)?;
    record.with_field(name, replaced)
}

fn replace(current: &Value, rest: &[String], value: Value, path: &str) -> Result<Value> {
    let Some((segment, rest)) = rest.split_first() else {
        return Ok(value);
    };
    match current {
        Value::Record(record) => set_in_record(record, segment, rest, value, path).map(Value::Record),
        Value::Map(entries) => {
            let mut entries = entries.clone();
            let updated = match entries.get(segment) {
                Some(child) => replace(child, rest, value, path)?,
                None if rest.is_empty() => value,
                None => {
                    return Err(VellumError::invalid_value(path, format!("no key '{}'", segment)));
                }
            };
            entries.insert(segment.clone(), updated);
            Ok(Value::Map(entries))
        }
        other => Err(cannot_descend(path, other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::TypeDefinition;
    use crate::registry::TypeRegistry;
    use vellum_core::{Timestamp, VersionInfo};

    fn registry() -> TypeRegistry {
        let registry = TypeRegistry::new();
        registry
            .register(
                TypeDefinition::new("Container")
                    .field("name", "str")
                    .field_with_default("rank", "int", 0)
                    .identity(["name"]),
                false,
            )
            .unwrap();
        registry
            .register(
                TypeDefinition::new("Outer")
                    .field("name", "str")
                    .field("container", "Subclass[Container]")
                    .field_with_default("tags", "dict[str, int]", Value::Map(Default::default()))
                    .identity(["name"]),
                false,
            )
            .unwrap();
        registry
    }

    fn outer(registry: &TypeRegistry) -> Record {
        let container = registry.builder("Container").unwrap().set("name", "c").build().unwrap();
        registry
            .builder("Outer")
            .unwrap()
            .set("name", "o")
            .set("container", container)
            .build()
            .unwrap()
    }

    #[test]
    fn test_set_nested_field() {
        let registry = registry();
        let record = outer(&registry);
        let info = VersionInfo {
            effective_version: 1,
            entry_version: 1,
            effective_time: Timestamp::from_secs(1),
            entry_time: Timestamp::from_secs(1),
            transaction_id: 1,
        };
        record.bookkeeping().set(info);

        let updated = record.at(["container", "rank"]).set(5).unwrap();
        assert_eq!(updated.at_path("container.rank").get().unwrap(), &Value::Int(5));
        assert_eq!(record.at_path("container.rank").get().unwrap(), &Value::Int(0));
        assert_eq!(updated.version(), info);
    }

    #[test]
    fn test_nested_identity_is_immutable() {
        let registry = registry();
        let err = outer(&registry).at_path("container.name").set("x").unwrap_err();
        assert!(matches!(err, VellumError::IdentityChange { .. }));
    }

    #[test]
    fn test_set_map_entry() {
        let registry = registry();
        let updated = outer(&registry).at_path("tags.a").set(1).unwrap();
        assert_eq!(updated.at_path("tags.a").get().unwrap(), &Value::Int(1));

        let err = outer(&registry).at_path("tags.a").set("one").unwrap_err();
        assert!(matches!(err, VellumError::InvalidValue { .. }));
    }

    #[test]
    fn test_bad_paths() {
        let registry = registry();
        let record = outer(&registry);
        assert!(record.at_path("nope").set(1).is_err());
        assert!(record.at_path("name.deeper").set(1).is_err());
        assert!(record.at(Vec::<String>::new()).set(1).is_err());
    }
}
