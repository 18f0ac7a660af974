//! Records
//!
//! A [`Record`] is an immutable, typed value: a descriptor plus one value per
//! declared field. Replacing a field produces a new record; identity fields
//! can never be replaced.
//!
//! ## Bookkeeping
//!
//! Each instance also carries hidden version bookkeeping (times, versions,
//! transaction). It takes no part in equality or serialization. The store
//! stamps it through a shared [`Bookkeeping`] handle after a successful write,
//! so the caller sees the new versions on the very instance it wrote. Cloning
//! a record copies the bookkeeping into a fresh cell.

use crate::codec;
use crate::descriptor::{IdentityKind, TypeDescriptor, CONTENT_HASH_FIELD};
use crate::hash::ContentHash;
use crate::value::Value;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use vellum_core::{IdentityValue, ObjectKey, Result, VellumError, VersionInfo};

// ============================================================================
// Bookkeeping
// ============================================================================

/// Shared handle to a record's version bookkeeping
#[derive(Clone, Default)]
pub struct Bookkeeping(Arc<Mutex<VersionInfo>>);

impl Bookkeeping {
    fn with(info: VersionInfo) -> Self {
        Bookkeeping(Arc::new(Mutex::new(info)))
    }

    /// Current bookkeeping
    pub fn get(&self) -> VersionInfo {
        *self.0.lock()
    }

    /// Overwrite the bookkeeping (used by stores after a write or read)
    pub fn set(&self, info: VersionInfo) {
        *self.0.lock() = info;
    }
}

impl fmt::Debug for Bookkeeping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.get(), f)
    }
}

// ============================================================================
// Record
// ============================================================================

/// An immutable typed value
pub struct Record {
    descriptor: Arc<TypeDescriptor>,
    fields: Arc<BTreeMap<String, Value>>,
    hash: Arc<OnceCell<ContentHash>>,
    bookkeeping: Bookkeeping,
}

impl Record {
    pub(crate) fn from_parts(descriptor: Arc<TypeDescriptor>, fields: BTreeMap<String, Value>) -> Self {
        Record {
            descriptor,
            fields: Arc::new(fields),
            hash: Arc::new(OnceCell::new()),
            bookkeeping: Bookkeeping::default(),
        }
    }

    /// Start building a record of `descriptor`'s type
    pub fn builder(descriptor: Arc<TypeDescriptor>) -> RecordBuilder {
        RecordBuilder::new(descriptor)
    }

    /// Concrete type tag
    pub fn type_tag(&self) -> &str {
        self.descriptor.type_tag()
    }

    /// Resolved type
    pub fn descriptor(&self) -> &Arc<TypeDescriptor> {
        &self.descriptor
    }

    /// Value of a field
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// All field values, by in-memory name
    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    /// Snapshot of the hidden bookkeeping
    pub fn version(&self) -> VersionInfo {
        self.bookkeeping.get()
    }

    /// Handle shared with this instance's bookkeeping
    pub fn bookkeeping(&self) -> &Bookkeeping {
        &self.bookkeeping
    }

    /// Effective version (0 before the first write)
    pub fn effective_version(&self) -> u64 {
        self.version().effective_version
    }

    /// Entry version (0 before the first write)
    pub fn entry_version(&self) -> u64 {
        self.version().entry_version
    }

    /// The type this record is stored under
    pub fn identity_type(&self) -> Result<&str> {
        Ok(self.descriptor.require_persistable()?.identity_type.as_str())
    }

    /// SHA3-512 of the canonical serialization, computed once
    pub fn content_hash(&self) -> ContentHash {
        *self
            .hash
            .get_or_init(|| ContentHash::of(codec::dumps(self).as_bytes()))
    }

    /// Wire values of the identity fields, in identity order
    pub fn identity_values(&self) -> Result<Vec<serde_json::Value>> {
        let identity = self.descriptor.require_persistable()?;
        if identity.kind == IdentityKind::ContentAddressed {
            return Ok(vec![serde_json::Value::String(self.content_hash().to_hex())]);
        }
        identity
            .fields
            .iter()
            .map(|name| {
                let field = self.descriptor.field(name).ok_or_else(|| VellumError::MissingIdentityField {
                    type_tag: self.type_tag().to_string(),
                    field: name.clone(),
                })?;
                let value = self.fields.get(name).unwrap_or(&Value::Null);
                Ok(codec::encode_value(&field.shape, value))
            })
            .collect()
    }

    /// Canonical serialized identity tuple
    pub fn identity_value(&self) -> Result<IdentityValue> {
        Ok(IdentityValue::from_values(&self.identity_values()?))
    }

    /// Address of this record's logical object
    pub fn key(&self) -> Result<ObjectKey> {
        Ok(ObjectKey::new(self.identity_type()?, self.identity_value()?))
    }

    /// Copy with one field replaced
    ///
    /// Fails with `IdentityChange` when the field is part of the identity and
    /// the value differs, and with `InvalidValue` when it does not fit the
    /// field's shape. Bookkeeping is carried over, except for a
    /// content-addressed record whose content changes: the copy is unwritten.
    pub fn with_field(&self, name: &str, value: impl Into<Value>) -> Result<Record> {
        self.with_fields([(name.to_string(), value.into())])
    }

    /// Copy with several fields replaced
    pub fn with_fields<I>(&self, changes: I) -> Result<Record>
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let mut fields = (*self.fields).clone();
        for (name, value) in changes {
            let field = self.descriptor.field(&name).ok_or_else(|| {
                VellumError::invalid_value(
                    format!("{}.{}", self.type_tag(), name),
                    "no such field",
                )
            })?;
            if self.descriptor.identity_fields().contains(&name)
                && self.fields.get(&name) != Some(&value)
            {
                return Err(VellumError::IdentityChange {
                    type_tag: self.type_tag().to_string(),
                    field: name,
                });
            }
            field
                .shape
                .check(&value, &format!("{}.{}", self.type_tag(), name))?;
            fields.insert(name, value);
        }
        // New content of a content-addressed record is a new object.
        let version = if self.descriptor.is_content_addressed() && fields != *self.fields {
            VersionInfo::UNWRITTEN
        } else {
            self.version()
        };
        Ok(Record {
            descriptor: Arc::clone(&self.descriptor),
            fields: Arc::new(fields),
            hash: Arc::new(OnceCell::new()),
            bookkeeping: Bookkeeping::with(version),
        })
    }
}

impl Clone for Record {
    fn clone(&self) -> Self {
        Record {
            descriptor: Arc::clone(&self.descriptor),
            fields: Arc::clone(&self.fields),
            hash: Arc::clone(&self.hash),
            bookkeeping: Bookkeeping::with(self.version()),
        }
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.type_tag() == other.type_tag() && self.fields == other.fields
    }
}

impl Eq for Record {}

impl Ord for Record {
    fn cmp(&self, other: &Self) -> Ordering {
        self.type_tag()
            .cmp(other.type_tag())
            .then_with(|| self.fields.cmp(&other.fields))
    }
}

impl PartialOrd for Record {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct(self.type_tag());
        for (name, value) in self.fields.iter() {
            s.field(name, value);
        }
        s.finish()
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builds a checked [`Record`]
#[derive(Debug)]
pub struct RecordBuilder {
    descriptor: Arc<TypeDescriptor>,
    values: BTreeMap<String, Value>,
}

impl RecordBuilder {
    /// Start building a record of `descriptor`'s type
    pub fn new(descriptor: Arc<TypeDescriptor>) -> Self {
        RecordBuilder {
            descriptor,
            values: BTreeMap::new(),
        }
    }

    /// Set a field
    pub fn set(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Check every value and fill in defaults
    pub fn build(self) -> Result<Record> {
        let tag = self.descriptor.type_tag();
        if let Some(unknown) = self
            .values
            .keys()
            .find(|name| self.descriptor.field(name).is_none())
        {
            return Err(VellumError::invalid_value(
                format!("{}.{}", tag, unknown),
                "no such field",
            ));
        }

        let mut fields = BTreeMap::new();
        for field in self.descriptor.fields() {
            let path = format!("{}.{}", tag, field.name);
            let value = match self.values.get(&field.name) {
                Some(value) => value.clone(),
                None => field
                    .default
                    .clone()
                    .ok_or_else(|| VellumError::invalid_value(&path, "missing required field"))?,
            };
            field.shape.check(&value, &path)?;
            fields.insert(field.name.clone(), value);
        }
        Ok(Record::from_parts(Arc::clone(&self.descriptor), fields))
    }
}

// ============================================================================
// Keys from arguments
// ============================================================================

/// Identity key of `descriptor` from positional identity values
pub fn make_key(descriptor: &TypeDescriptor, args: &[Value]) -> Result<ObjectKey> {
    let identity = descriptor.require_persistable()?;
    if args.len() > identity.fields.len() {
        return Err(VellumError::invalid_value(
            descriptor.type_tag(),
            format!(
                "expected {} identity values, got {}",
                identity.fields.len(),
                args.len()
            ),
        ));
    }
    let named: BTreeMap<String, Value> = identity
        .fields
        .iter()
        .cloned()
        .zip(args.iter().cloned())
        .collect();
    make_key_named(descriptor, &named)
}

/// Identity key of `descriptor` from named identity values
pub fn make_key_named(descriptor: &TypeDescriptor, args: &BTreeMap<String, Value>) -> Result<ObjectKey> {
    let identity = descriptor.require_persistable()?;
    let mut values = Vec::with_capacity(identity.fields.len());
    for name in &identity.fields {
        let value = args.get(name).ok_or_else(|| VellumError::MissingIdentityField {
            type_tag: descriptor.type_tag().to_string(),
            field: name.clone(),
        })?;
        let path = format!("{}.{}", descriptor.type_tag(), name);
        if identity.kind == IdentityKind::ContentAddressed && name == CONTENT_HASH_FIELD {
            let hex = value
                .as_str()
                .filter(|s| ContentHash::from_hex(s).is_some())
                .ok_or_else(|| VellumError::invalid_value(&path, "expected a hex SHA3-512 digest"))?;
            values.push(serde_json::Value::String(hex.to_ascii_lowercase()));
            continue;
        }
        let field = descriptor.field(name).ok_or_else(|| VellumError::MissingIdentityField {
            type_tag: descriptor.type_tag().to_string(),
            field: name.clone(),
        })?;
        field.shape.check(value, &path)?;
        values.push(codec::encode_value(&field.shape, value));
    }
    Ok(ObjectKey::new(
        identity.identity_type.clone(),
        IdentityValue::from_values(&values),
    ))
}
