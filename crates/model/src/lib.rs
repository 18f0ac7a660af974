//! Record model for Vellum
//!
//! This crate turns type definitions into typed, serializable records:
//! - Registry: process-wide map of type tags to descriptors, with providers
//! - Descriptors: resolved fields, bases and identity of a type
//! - Shapes: what a field may hold, parsed from type expressions
//! - Records: immutable values with hidden version bookkeeping
//! - Codec: canonical, minimal-diff JSON with discriminated polymorphism
//! - Lens: path-based replacement of nested values

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod alias;
pub mod codec;
pub mod descriptor;
pub mod hash;
pub mod lens;
pub mod record;
pub mod registry;
pub mod schema;
pub mod shape;
pub mod value;

pub use codec::{Codec, Expected};
pub use descriptor::{
    FieldDescriptor, Identity, IdentityKind, ShapeSpec, TypeDefinition, TypeDescriptor,
    CONTENT_HASH_FIELD,
};
pub use hash::ContentHash;
pub use lens::Lens;
pub use record::{make_key, make_key_named, Bookkeeping, Record, RecordBuilder};
pub use registry::{TypeProvider, TypeRegistry};
pub use shape::FieldShape;
pub use value::Value;
