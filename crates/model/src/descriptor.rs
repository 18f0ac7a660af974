//! Type definitions and resolved descriptors
//!
//! A [`TypeDefinition`] is what callers write: a tag, base types, fields and
//! an optional identity declaration. Registration validates it against the
//! already-registered bases and produces an immutable [`TypeDescriptor`],
//! which is what records and the codec work from.

use crate::alias::to_camel;
use crate::shape::FieldShape;
use crate::value::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use vellum_core::{Result, VellumError, TYPE_KEY};

/// Fixed attribute usable as the identity of content-addressed types
pub const CONTENT_HASH_FIELD: &str = "content_hash";

// ============================================================================
// Definitions
// ============================================================================

/// A field shape given either directly or as a type expression
#[derive(Debug, Clone)]
pub enum ShapeSpec {
    /// Already-built shape
    Shape(FieldShape),
    /// Type expression, parsed at registration
    Expr(String),
}

impl From<FieldShape> for ShapeSpec {
    fn from(shape: FieldShape) -> Self {
        ShapeSpec::Shape(shape)
    }
}

impl From<&str> for ShapeSpec {
    fn from(expr: &str) -> Self {
        ShapeSpec::Expr(expr.to_string())
    }
}

impl From<String> for ShapeSpec {
    fn from(expr: String) -> Self {
        ShapeSpec::Expr(expr)
    }
}

#[derive(Debug, Clone)]
struct FieldDefinition {
    name: String,
    shape: ShapeSpec,
    default: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum IdentityDeclaration {
    None,
    Declared(Vec<String>),
    Derived(Vec<String>),
    ContentAddressed,
}

/// A type as declared by its author
///
/// ```ignore
/// let def = TypeDefinition::new("Container")
///     .field("name", "str")
///     .field_with_default("rank", "int", 0)
///     .identity(["name"]);
/// ```
#[derive(Debug, Clone)]
pub struct TypeDefinition {
    type_tag: String,
    bases: Vec<String>,
    fields: Vec<FieldDefinition>,
    identity: IdentityDeclaration,
    immutable: bool,
}

impl TypeDefinition {
    /// Start a definition for `type_tag`
    pub fn new(type_tag: impl Into<String>) -> Self {
        TypeDefinition {
            type_tag: type_tag.into(),
            bases: Vec::new(),
            fields: Vec::new(),
            identity: IdentityDeclaration::None,
            immutable: false,
        }
    }

    /// Add a base type; fields and identity are inherited from every base
    pub fn base(mut self, base: impl Into<String>) -> Self {
        self.bases.push(base.into());
        self
    }

    /// Add a field with no default (required unless optional)
    pub fn field(mut self, name: impl Into<String>, shape: impl Into<ShapeSpec>) -> Self {
        self.fields.push(FieldDefinition {
            name: name.into(),
            shape: shape.into(),
            default: None,
        });
        self
    }

    /// Add a field with a default value
    pub fn field_with_default(
        mut self,
        name: impl Into<String>,
        shape: impl Into<ShapeSpec>,
        default: impl Into<Value>,
    ) -> Self {
        self.fields.push(FieldDefinition {
            name: name.into(),
            shape: shape.into(),
            default: Some(default.into()),
        });
        self
    }

    /// Declare the identity fields; descendants adopt this identity
    pub fn identity<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.identity = IdentityDeclaration::Declared(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Declare identity fields that each concrete descendant owns
    ///
    /// The declaring type is abstract: it cannot be read or written.
    pub fn derived_identity<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.identity = IdentityDeclaration::Derived(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Identify instances by the hash of their contents (implies immutable)
    pub fn content_addressed(mut self) -> Self {
        self.identity = IdentityDeclaration::ContentAddressed;
        self.immutable = true;
        self
    }

    /// Written at most once per identity
    pub fn immutable(mut self) -> Self {
        self.immutable = true;
        self
    }

    /// The tag being defined
    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    /// Declared base tags
    pub fn bases(&self) -> &[String] {
        &self.bases
    }

    /// Validate against resolved `bases` and build the descriptor
    ///
    /// `subtypes` lists the tags currently registered under a base, used to
    /// freeze `Subclass[Base]` fields.
    pub fn build<F>(self, bases: &[Arc<TypeDescriptor>], subtypes: F) -> Result<TypeDescriptor>
    where
        F: Fn(&str) -> Option<BTreeSet<String>>,
    {
        let tag = self.type_tag;

        if let Some(field) = self.fields.iter().find(|f| f.name == TYPE_KEY || to_camel(&f.name) == TYPE_KEY) {
            return Err(VellumError::ReservedField {
                type_tag: tag,
                field: field.name.clone(),
            });
        }

        // Inherited fields first, earlier bases win.
        let mut fields: Vec<FieldDescriptor> = Vec::new();
        for base in bases {
            for field in &base.fields {
                if !fields.iter().any(|f| f.name == field.name) {
                    fields.push(field.clone());
                }
            }
        }

        let subtypes_or_self = |base: &str| {
            if base == tag {
                Some(BTreeSet::from([tag.clone()]))
            } else {
                subtypes(base)
            }
        };
        for def in self.fields {
            let shape = match def.shape {
                ShapeSpec::Shape(shape) => shape,
                ShapeSpec::Expr(expr) => FieldShape::parse(&def.name, &expr)?,
            };
            let shape = shape.freeze(&def.name, &subtypes_or_self)?;
            let default = def.default.or_else(|| shape.implicit_default());
            if let Some(default) = &default {
                shape.check(default, &format!("{}.{}", tag, def.name))?;
            }
            let field = FieldDescriptor {
                wire_name: to_camel(&def.name),
                name: def.name,
                shape,
                default,
            };
            match fields.iter_mut().find(|f| f.name == field.name) {
                Some(existing) => *existing = field,
                None => fields.push(field),
            }
        }

        let identity = resolve_identity(&tag, self.identity, bases, &fields)?;
        let immutable = self.immutable
            || bases.iter().any(|b| b.immutable)
            || identity
                .as_ref()
                .map_or(false, |i| i.kind == IdentityKind::ContentAddressed);

        let mut ancestors: BTreeSet<String> = bases
            .iter()
            .flat_map(|b| b.ancestors.iter().cloned())
            .collect();
        ancestors.insert(tag.clone());

        let field_index = fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name.clone(), i))
            .collect();
        let wire_index = fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.wire_name.clone(), i))
            .collect();

        Ok(TypeDescriptor {
            type_tag: tag,
            bases: bases.iter().map(|b| b.type_tag.clone()).collect(),
            ancestors,
            fields,
            field_index,
            wire_index,
            identity,
            immutable,
        })
    }
}

fn resolve_identity(
    tag: &str,
    declaration: IdentityDeclaration,
    bases: &[Arc<TypeDescriptor>],
    fields: &[FieldDescriptor],
) -> Result<Option<Identity>> {
    let mut inherited: Vec<&Identity> = Vec::new();
    for identity in bases.iter().filter_map(|b| b.identity.as_ref()) {
        if !inherited.iter().any(|i| i.origin() == identity.origin()) {
            inherited.push(identity);
        }
    }
    if inherited.len() > 1 {
        let origins: Vec<&str> = inherited.iter().map(|i| i.origin()).collect();
        return Err(VellumError::DuplicateIdentityDefinition {
            type_tag: tag.to_string(),
            reason: format!("identity inherited from multiple bases: {}", origins.join(", ")),
        });
    }

    if let Some(parent) = inherited.first() {
        if declaration != IdentityDeclaration::None {
            return Err(VellumError::DuplicateIdentityDefinition {
                type_tag: tag.to_string(),
                reason: format!("cannot override identity defined on {}", parent.origin()),
            });
        }
        let identity = match parent.kind {
            IdentityKind::Declared => (*parent).clone(),
            // The first concrete descendant becomes the identity type.
            IdentityKind::Derived => Identity {
                kind: IdentityKind::Declared,
                identity_type: tag.to_string(),
                fields: parent.fields.clone(),
                declared_by: parent.declared_by.clone(),
            },
            IdentityKind::ContentAddressed => Identity {
                identity_type: tag.to_string(),
                ..(*parent).clone()
            },
        };
        return Ok(Some(identity));
    }

    let (kind, id_fields) = match declaration {
        IdentityDeclaration::None => return Ok(None),
        IdentityDeclaration::Declared(f) => (IdentityKind::Declared, f),
        IdentityDeclaration::Derived(f) => (IdentityKind::Derived, f),
        IdentityDeclaration::ContentAddressed => {
            (IdentityKind::ContentAddressed, vec![CONTENT_HASH_FIELD.to_string()])
        }
    };
    for name in &id_fields {
        let fixed = kind == IdentityKind::ContentAddressed && name == CONTENT_HASH_FIELD;
        if !fixed && !fields.iter().any(|f| &f.name == name) {
            return Err(VellumError::MissingIdentityField {
                type_tag: tag.to_string(),
                field: name.clone(),
            });
        }
    }
    Ok(Some(Identity {
        kind,
        identity_type: tag.to_string(),
        fields: id_fields,
        declared_by: tag.to_string(),
    }))
}

// ============================================================================
// Descriptors
// ============================================================================

/// How a type's identity is bound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityKind {
    /// The identity type is shared by all descendants
    Declared,
    /// Unbound: each concrete descendant will own it
    Derived,
    /// Content hash, owned by each subtype
    ContentAddressed,
}

/// A resolved identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// How the identity is bound
    pub kind: IdentityKind,
    /// The type objects are stored under
    pub identity_type: String,
    /// Ordered identity field names
    pub fields: Vec<String>,
    /// The type that declared the identity fields
    pub declared_by: String,
}

impl Identity {
    fn origin(&self) -> &str {
        match self.kind {
            IdentityKind::ContentAddressed => &self.declared_by,
            _ => &self.identity_type,
        }
    }
}

/// A resolved field
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    /// In-memory name
    pub name: String,
    /// Name on the wire
    pub wire_name: String,
    /// Admitted values
    pub shape: FieldShape,
    /// Value taken when absent, if any
    pub default: Option<Value>,
}

impl FieldDescriptor {
    /// True when the field has no default
    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }
}

/// A registered type
#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    type_tag: String,
    bases: Vec<String>,
    ancestors: BTreeSet<String>,
    fields: Vec<FieldDescriptor>,
    field_index: HashMap<String, usize>,
    wire_index: HashMap<String, usize>,
    identity: Option<Identity>,
    immutable: bool,
}

impl TypeDescriptor {
    /// Concrete tag
    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    /// Direct base tags
    pub fn bases(&self) -> &[String] {
        &self.bases
    }

    /// This tag and every ancestor tag
    pub fn ancestors(&self) -> &BTreeSet<String> {
        &self.ancestors
    }

    /// True when `tag` is this type or an ancestor
    pub fn is_a(&self, tag: &str) -> bool {
        self.ancestors.contains(tag)
    }

    /// All fields, inherited first
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Field by in-memory name
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.field_index.get(name).map(|&i| &self.fields[i])
    }

    /// Field by wire name
    pub fn field_by_wire_name(&self, wire_name: &str) -> Option<&FieldDescriptor> {
        self.wire_index.get(wire_name).map(|&i| &self.fields[i])
    }

    /// Identity, if any ancestor declared one
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// The type objects of this type are stored under
    pub fn identity_type(&self) -> Option<&str> {
        self.persistable_identity().map(|i| i.identity_type.as_str())
    }

    /// Ordered identity field names (empty when none)
    pub fn identity_fields(&self) -> &[String] {
        self.identity
            .as_ref()
            .map_or(&[][..], |i| i.fields.as_slice())
    }

    /// Whether records of this type can be read and written
    pub fn is_persistable(&self) -> bool {
        self.persistable_identity().is_some()
    }

    /// Identity, unless absent or still unbound
    pub fn persistable_identity(&self) -> Option<&Identity> {
        self.identity
            .as_ref()
            .filter(|i| i.kind != IdentityKind::Derived)
    }

    /// Identified by content hash
    pub fn is_content_addressed(&self) -> bool {
        self.identity
            .as_ref()
            .map_or(false, |i| i.kind == IdentityKind::ContentAddressed)
    }

    /// Written at most once per identity
    pub fn is_immutable(&self) -> bool {
        self.immutable
    }

    /// Fail with `NotPersistable` unless persistable
    pub fn require_persistable(&self) -> Result<&Identity> {
        self.persistable_identity()
            .ok_or_else(|| VellumError::NotPersistable {
                type_tag: self.type_tag.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vellum_core::ErrorKind;

    fn no_subtypes(_: &str) -> Option<BTreeSet<String>> {
        None
    }

    fn build(def: TypeDefinition, bases: &[Arc<TypeDescriptor>]) -> Result<Arc<TypeDescriptor>> {
        def.build(bases, no_subtypes).map(Arc::new)
    }

    #[test]
    fn test_declared_identity_is_adopted() {
        let container = build(
            TypeDefinition::new("Container")
                .field("name", "str")
                .field_with_default("rank", "int", 0)
                .identity(["name"]),
            &[],
        )
        .unwrap();
        let sub = build(
            TypeDefinition::new("Container2").base("Container").field("date", "date"),
            &[container.clone()],
        )
        .unwrap();

        assert_eq!(sub.identity_type(), Some("Container"));
        assert_eq!(sub.identity_fields(), ["name".to_string()]);
        assert!(sub.is_a("Container"));
        assert!(!container.is_a("Container2"));
        assert_eq!(sub.fields().len(), 3);
        assert_eq!(sub.field("rank").unwrap().default, Some(Value::Int(0)));
    }

    #[test]
    fn test_derived_identity_binds_at_first_descendant() {
        let named = build(
            TypeDefinition::new("Named").field("name", "str").derived_identity(["name"]),
            &[],
        )
        .unwrap();
        assert!(!named.is_persistable());
        assert!(named.require_persistable().is_err());

        let a = build(TypeDefinition::new("A").base("Named"), &[named.clone()]).unwrap();
        assert_eq!(a.identity_type(), Some("A"));

        let a2 = build(TypeDefinition::new("A2").base("A"), &[a]).unwrap();
        assert_eq!(a2.identity_type(), Some("A"));
    }

    #[test]
    fn test_content_addressed_per_subtype() {
        let blob = build(
            TypeDefinition::new("Blob").field("data", "str").content_addressed(),
            &[],
        )
        .unwrap();
        assert!(blob.is_immutable());
        assert_eq!(blob.identity_fields(), [CONTENT_HASH_FIELD.to_string()]);

        let sub = build(TypeDefinition::new("SubBlob").base("Blob"), &[blob]).unwrap();
        assert_eq!(sub.identity_type(), Some("SubBlob"));
        assert!(sub.is_immutable());
    }

    #[test]
    fn test_identity_errors() {
        let err = build(TypeDefinition::new("T").field("a", "str").identity(["b"]), &[]).unwrap_err();
        assert!(matches!(err, VellumError::MissingIdentityField { .. }));

        let base = build(TypeDefinition::new("B").field("a", "str").identity(["a"]), &[]).unwrap();
        let err = build(TypeDefinition::new("C").base("B").identity(["a"]), &[base.clone()]).unwrap_err();
        assert!(matches!(err, VellumError::DuplicateIdentityDefinition { .. }));

        let other = build(TypeDefinition::new("O").field("b", "str").identity(["b"]), &[]).unwrap();
        let err = build(TypeDefinition::new("D").base("B").base("O"), &[base, other]).unwrap_err();
        assert!(matches!(err, VellumError::DuplicateIdentityDefinition { .. }));
    }

    #[test]
    fn test_diamond_through_same_identity_is_allowed() {
        let base = build(TypeDefinition::new("B").field("a", "str").identity(["a"]), &[]).unwrap();
        let left = build(TypeDefinition::new("L").base("B"), &[base.clone()]).unwrap();
        let d = build(TypeDefinition::new("D").base("L").base("B"), &[left, base]).unwrap();
        assert_eq!(d.identity_type(), Some("B"));
        assert!(d.is_a("L"));
    }

    #[test]
    fn test_reserved_field_and_bad_default() {
        let err = build(TypeDefinition::new("T").field("t_", "str"), &[]).unwrap_err();
        assert!(matches!(err, VellumError::ReservedField { .. }));

        let err = build(
            TypeDefinition::new("T").field_with_default("n", "int", "zero"),
            &[],
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_optional_defaults_to_null() {
        let t = build(TypeDefinition::new("T").field("n", "Optional[int]"), &[]).unwrap();
        let field = t.field("n").unwrap();
        assert!(!field.is_required());
        assert_eq!(field.default, Some(Value::Null));
    }

    #[test]
    fn test_wire_names() {
        let t = build(TypeDefinition::new("Outer").field("the_nested", "Nested"), &[]).unwrap();
        assert_eq!(t.field_by_wire_name("theNested").unwrap().name, "the_nested");
    }

    #[test]
    fn test_self_referential_subclass() {
        let t = build(
            TypeDefinition::new("Node").field("children", "list[Subclass[Node]]"),
            &[],
        )
        .unwrap();
        let shape = &t.field("children").unwrap().shape;
        assert_eq!(shape.to_string(), "list[Subclass[Node]]");
    }
}
