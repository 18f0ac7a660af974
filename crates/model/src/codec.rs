//! Typed codec
//!
//! Converts records to canonical JSON and back.
//!
//! - Every record object carries its discriminator under `t_`
//! - Field names are camelCased on the wire; mapping keys are user data and
//!   are left alone
//! - Only fields that differ from their declared default are written, so a
//!   stored payload depends on the defaults in force when it is read
//! - Object keys are sorted and output is compact, which makes the bytes
//!   suitable for content hashing
//!
//! Dates and datetimes inside unions are wrapped (`{"t_": "_d", "v": ...}`,
//! `{"t_": "_dt", "v": ...}`) so they cannot be mistaken for strings.

use crate::descriptor::TypeDescriptor;
use crate::record::Record;
use crate::registry::TypeRegistry;
use crate::shape::FieldShape;
use crate::value::Value;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde_json::{Map, Number, Value as Json};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::warn;
use vellum_core::{Result, VellumError, TYPE_KEY};

const DATE_TAG: &str = "_d";
const DATETIME_TAG: &str = "_dt";
const WRAPPED_VALUE: &str = "v";
const DATE_FORMAT: &str = "%Y-%m-%d";

// ============================================================================
// Encoding
// ============================================================================

/// Minimal-diff JSON object for a record, with discriminator
pub fn to_json(record: &Record) -> Json {
    let mut obj = Map::new();
    obj.insert(TYPE_KEY.to_string(), Json::String(record.type_tag().to_string()));
    for field in record.descriptor().fields() {
        let value = record.get(&field.name).unwrap_or(&Value::Null);
        if field.default.as_ref() == Some(value) {
            continue;
        }
        obj.insert(field.wire_name.clone(), encode(&field.shape, value, false));
    }
    Json::Object(obj)
}

/// Canonical serialization of a record
pub fn dumps(record: &Record) -> String {
    let mut out = String::new();
    write_canonical(&to_json(record), &mut out);
    out
}

/// Wire form of a value of the given shape, outside any union
pub fn encode_value(shape: &FieldShape, value: &Value) -> Json {
    encode(shape, value, false)
}

/// Compact JSON with object keys sorted at every level
pub fn canonical_string(json: &Json) -> String {
    let mut out = String::new();
    write_canonical(json, &mut out);
    out
}

fn encode(shape: &FieldShape, value: &Value, in_union: bool) -> Json {
    match (shape, value) {
        (FieldShape::Optional(_), Value::Null) => Json::Null,
        (FieldShape::Optional(inner), value) => encode(inner, value, in_union),
        (FieldShape::Union(members), value) => {
            match members.iter().find(|m| m.check(value, "").is_ok()) {
                Some(member) => encode(member, value, true),
                None => encode_plain(value, true),
            }
        }
        (FieldShape::List(inner), Value::List(items)) => {
            Json::Array(items.iter().map(|v| encode(inner, v, false)).collect())
        }
        (FieldShape::Set(inner), Value::Set(items)) => {
            Json::Array(items.iter().map(|v| encode(inner, v, false)).collect())
        }
        (FieldShape::Map(inner), Value::Map(entries)) => Json::Object(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), encode(inner, v, false)))
                .collect(),
        ),
        (_, value) => encode_plain(value, in_union),
    }
}

fn encode_plain(value: &Value, in_union: bool) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(i) => Json::Number(Number::from(*i)),
        Value::Float(f) => Number::from_f64(*f).map_or(Json::Null, Json::Number),
        Value::String(s) => Json::String(s.clone()),
        Value::Date(d) => wrap(DATE_TAG, d.format(DATE_FORMAT).to_string(), in_union),
        Value::DateTime(dt) => wrap(
            DATETIME_TAG,
            dt.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            in_union,
        ),
        Value::List(items) => Json::Array(items.iter().map(|v| encode_plain(v, false)).collect()),
        Value::Set(items) => Json::Array(items.iter().map(|v| encode_plain(v, false)).collect()),
        Value::Map(entries) => Json::Object(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), encode_plain(v, false)))
                .collect(),
        ),
        Value::Record(record) => to_json(record),
    }
}

fn wrap(tag: &str, text: String, in_union: bool) -> Json {
    if !in_union {
        return Json::String(text);
    }
    let mut obj = Map::new();
    obj.insert(TYPE_KEY.to_string(), Json::String(tag.to_string()));
    obj.insert(WRAPPED_VALUE.to_string(), Json::String(text));
    Json::Object(obj)
}

fn write_canonical(json: &Json, out: &mut String) {
    match json {
        Json::Object(obj) => {
            let mut entries: Vec<(&String, &Json)> = obj.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, value)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(key, out);
                out.push(':');
                write_canonical(value, out);
            }
            out.push('}');
        }
        Json::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Json::String(s) => write_string(s, out),
        other => {
            let _ = write!(out, "{}", other);
        }
    }
}

fn write_string(s: &str, out: &mut String) {
    let _ = write!(out, "{}", Json::String(s.to_string()));
}

// ============================================================================
// Decoding
// ============================================================================

/// What a decoded record is allowed to be
#[derive(Debug, Clone, Copy)]
pub enum Expected<'a> {
    /// Any registered type
    Any,
    /// The tag or one of its subtypes
    SubtypeOf(&'a str),
    /// A frozen `Subclass[base]` union
    OneOf {
        /// Declared base
        base: &'a str,
        /// Admitted tags
        members: &'a BTreeSet<String>,
    },
}

/// Decodes records, resolving discriminators through a registry
#[derive(Debug, Clone, Copy)]
pub struct Codec<'r> {
    registry: &'r TypeRegistry,
}

impl<'r> Codec<'r> {
    /// Codec over `registry`
    pub fn new(registry: &'r TypeRegistry) -> Self {
        Codec { registry }
    }

    /// Codec over the process-wide registry
    pub fn global() -> Codec<'static> {
        Codec {
            registry: TypeRegistry::global(),
        }
    }

    /// The registry discriminators are resolved against
    pub fn registry(&self) -> &'r TypeRegistry {
        self.registry
    }

    /// Decode JSON text
    pub fn loads(&self, text: &str, expected: Expected<'_>) -> Result<Record> {
        let json: Json = serde_json::from_str(text)?;
        self.from_json(&json, expected)
    }

    /// Decode a JSON record object
    pub fn from_json(&self, json: &Json, expected: Expected<'_>) -> Result<Record> {
        self.decode_record(json, expected, "$")
    }

    /// Resolve a discriminator, retrying once through the providers
    pub fn resolve_tag(&self, tag: &str) -> Result<Arc<TypeDescriptor>> {
        if let Some(descriptor) = self.registry.lookup(tag) {
            return Ok(descriptor);
        }
        warn!(target: "vellum::codec", type_tag = tag, "Type not cached, attempting dynamic load");
        self.registry.resolve(tag).map_err(|e| {
            if e.is_not_found() {
                VellumError::unresolvable(Some(tag), "type is not registered")
            } else {
                e
            }
        })
    }

    fn decode_record(&self, json: &Json, expected: Expected<'_>, path: &str) -> Result<Record> {
        let obj = json
            .as_object()
            .ok_or_else(|| VellumError::invalid_value(path, "expected a record object"))?;
        let tag = match obj.get(TYPE_KEY) {
            Some(Json::String(tag)) => tag.as_str(),
            Some(_) => {
                return Err(VellumError::unresolvable(None, format!("discriminator at {} is not a string", path)));
            }
            None => {
                return Err(VellumError::unresolvable(None, format!("no discriminator at {}", path)));
            }
        };
        let descriptor = self.resolve_tag(tag)?;

        match expected {
            Expected::Any => {}
            Expected::SubtypeOf(base) => {
                if !descriptor.is_a(base) {
                    return Err(VellumError::invalid_value(path, format!("{} is not a {}", tag, base)));
                }
            }
            Expected::OneOf { base, members } => {
                if !members.contains(tag) {
                    if descriptor.is_a(base) {
                        return Err(VellumError::unresolvable(
                            Some(tag),
                            format!("registered after the union Subclass[{}] was built", base),
                        ));
                    }
                    return Err(VellumError::invalid_value(
                        path,
                        format!("{} is not a member of Subclass[{}]", tag, base),
                    ));
                }
            }
        }

        let mut fields = BTreeMap::new();
        for field in descriptor.fields() {
            let field_path = format!("{}.{}", path, field.wire_name);
            let value = match obj.get(&field.wire_name) {
                Some(raw) => self.decode(&field.shape, raw, &field_path, false)?,
                None => field
                    .default
                    .clone()
                    .ok_or_else(|| VellumError::invalid_value(&field_path, "missing required field"))?,
            };
            fields.insert(field.name.clone(), value);
        }
        Ok(Record::from_parts(descriptor, fields))
    }

    /// Decode a value of the given shape
    pub fn decode_value(&self, shape: &FieldShape, json: &Json, path: &str) -> Result<Value> {
        self.decode(shape, json, path, false)
    }

    fn decode(&self, shape: &FieldShape, json: &Json, path: &str, in_union: bool) -> Result<Value> {
        let mismatch = || {
            VellumError::invalid_value(path, format!("expected {}, got {}", shape, json_kind(json)))
        };
        match shape {
            FieldShape::String => json.as_str().map(Value::from).ok_or_else(mismatch),
            FieldShape::Integer => json.as_i64().map(Value::Int).ok_or_else(mismatch),
            FieldShape::Float => json.as_f64().map(Value::Float).ok_or_else(mismatch),
            FieldShape::Boolean => json.as_bool().map(Value::Bool).ok_or_else(mismatch),
            FieldShape::Date => {
                let text = unwrap_text(json, DATE_TAG, in_union).ok_or_else(mismatch)?;
                NaiveDate::parse_from_str(text, DATE_FORMAT)
                    .map(Value::Date)
                    .map_err(|e| VellumError::invalid_value(path, e.to_string()))
            }
            FieldShape::DateTime => {
                let text = unwrap_text(json, DATETIME_TAG, in_union).ok_or_else(mismatch)?;
                DateTime::parse_from_rfc3339(text)
                    .map(|dt| Value::DateTime(dt.with_timezone(&Utc)))
                    .map_err(|e| VellumError::invalid_value(path, e.to_string()))
            }
            FieldShape::List(inner) => {
                let items = json.as_array().ok_or_else(mismatch)?;
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| self.decode(inner, item, &format!("{}[{}]", path, i), false))
                    .collect::<Result<Vec<_>>>()
                    .map(Value::List)
            }
            FieldShape::Set(inner) => {
                let items = json.as_array().ok_or_else(mismatch)?;
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| self.decode(inner, item, &format!("{}[{}]", path, i), false))
                    .collect::<Result<BTreeSet<_>>>()
                    .map(Value::Set)
            }
            FieldShape::Map(inner) => {
                let obj = json.as_object().ok_or_else(mismatch)?;
                if in_union && obj.contains_key(TYPE_KEY) {
                    return Err(mismatch());
                }
                obj.iter()
                    .map(|(k, v)| {
                        self.decode(inner, v, &format!("{}.{}", path, k), false)
                            .map(|value| (k.clone(), value))
                    })
                    .collect::<Result<BTreeMap<_, _>>>()
                    .map(Value::Map)
            }
            FieldShape::Optional(inner) => {
                if json.is_null() {
                    Ok(Value::Null)
                } else {
                    self.decode(inner, json, path, in_union)
                }
            }
            FieldShape::Union(members) => {
                for member in members {
                    match self.decode(member, json, path, true) {
                        Ok(value) => return Ok(value),
                        Err(e @ VellumError::UnresolvableType { .. }) => return Err(e),
                        Err(_) => continue,
                    }
                }
                Err(mismatch())
            }
            FieldShape::Record(tag) | FieldShape::Subclass(tag) => {
                if in_union && !has_record_tag(json) {
                    return Err(mismatch());
                }
                self.decode_record(json, Expected::SubtypeOf(tag), path)
                    .map(Value::Record)
            }
            FieldShape::OneOf { base, members } => {
                if in_union && !has_record_tag(json) {
                    return Err(mismatch());
                }
                self.decode_record(json, Expected::OneOf { base, members }, path)
                    .map(Value::Record)
            }
        }
    }
}

fn unwrap_text<'a>(json: &'a Json, tag: &str, in_union: bool) -> Option<&'a str> {
    if !in_union {
        return json.as_str();
    }
    let obj = json.as_object()?;
    if obj.get(TYPE_KEY)?.as_str()? != tag {
        return None;
    }
    obj.get(WRAPPED_VALUE)?.as_str()
}

fn has_record_tag(json: &Json) -> bool {
    match json.get(TYPE_KEY).and_then(Json::as_str) {
        Some(tag) => tag != DATE_TAG && tag != DATETIME_TAG,
        None => false,
    }
}

fn json_kind(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "bool",
        Json::Number(n) if n.is_f64() => "float",
        Json::Number(_) => "int",
        Json::String(_) => "str",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}
