//! Type registry
//!
//! Maps type tags to resolved descriptors. The registry is append-only:
//! a permanent registration lives for the lifetime of the registry, while a
//! temporary one may be replaced (handy for tests that redefine a type).
//!
//! ## Resolution
//!
//! `resolve` consults the cache first and then each [`TypeProvider`] in
//! installation order. A provider hit is validated and registered
//! permanently, so later lookups never reach the providers again.
//!
//! ```ignore
//! let registry = TypeRegistry::global();
//! registry.register(TypeDefinition::new("Nested").field("name", "str"), false)?;
//! let descriptor = registry.resolve("Nested")?;
//! ```

use crate::descriptor::{TypeDefinition, TypeDescriptor};
use crate::record::RecordBuilder;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};
use vellum_core::{Result, VellumError};

/// Source of type definitions not registered up front
///
/// Providers play the part of plugin discovery: the registry asks them for a
/// tag it has never seen, in the order they were installed.
pub trait TypeProvider: Send + Sync {
    /// Name for logging
    fn name(&self) -> &str;

    /// Definition of `type_tag`, if this provider knows it
    fn provide(&self, type_tag: &str) -> Option<TypeDefinition>;
}

#[derive(Clone)]
struct Entry {
    descriptor: Arc<TypeDescriptor>,
    temporary: bool,
}

/// Thread-safe registry of record types
pub struct TypeRegistry {
    types: DashMap<String, Entry>,
    providers: RwLock<Vec<Arc<dyn TypeProvider>>>,
    /// Serializes validation against the registered type graph
    registration: Mutex<()>,
}

static GLOBAL: Lazy<Arc<TypeRegistry>> = Lazy::new(|| Arc::new(TypeRegistry::new()));

impl TypeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        TypeRegistry {
            types: DashMap::new(),
            providers: RwLock::new(Vec::new()),
            registration: Mutex::new(()),
        }
    }

    /// The process-wide registry
    pub fn global() -> &'static TypeRegistry {
        &GLOBAL
    }

    /// Shared handle to the process-wide registry
    pub fn shared() -> Arc<TypeRegistry> {
        Arc::clone(&GLOBAL)
    }

    /// Validate and register a definition
    ///
    /// Bases are resolved first (providers included). Registering a tag that
    /// is already permanently registered fails with `DuplicateRegistration`;
    /// a temporary registration is replaced.
    pub fn register(&self, definition: TypeDefinition, temporary: bool) -> Result<Arc<TypeDescriptor>> {
        let tag = definition.type_tag().to_string();

        let mut bases = Vec::with_capacity(definition.bases().len());
        for base in definition.bases() {
            match self.resolve(base) {
                Ok(descriptor) => bases.push(descriptor),
                Err(e) if e.is_not_found() => {
                    return Err(VellumError::UnknownBase {
                        type_tag: tag,
                        base: base.clone(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        let _guard = self.registration.lock();

        let existing_permanent = self.types.get(&tag).map_or(false, |e| !e.temporary);
        if existing_permanent {
            return Err(VellumError::DuplicateRegistration { type_tag: tag });
        }

        let descriptor = Arc::new(definition.build(&bases, |base| self.registered_subtypes(base))?);
        self.types.insert(
            tag.clone(),
            Entry {
                descriptor: Arc::clone(&descriptor),
                temporary,
            },
        );
        debug!(target: "vellum::registry", type_tag = %tag, temporary, "Registered type");
        Ok(descriptor)
    }

    /// Resolve a tag, consulting providers on a cache miss
    pub fn resolve(&self, type_tag: &str) -> Result<Arc<TypeDescriptor>> {
        if let Some(descriptor) = self.lookup(type_tag) {
            return Ok(descriptor);
        }

        let providers: Vec<Arc<dyn TypeProvider>> = self.providers.read().clone();
        for provider in providers {
            let Some(definition) = provider.provide(type_tag) else {
                continue;
            };
            if definition.type_tag() != type_tag {
                warn!(
                    target: "vellum::registry",
                    provider = provider.name(),
                    requested = type_tag,
                    provided = definition.type_tag(),
                    "Provider returned a definition for a different tag"
                );
                continue;
            }
            debug!(target: "vellum::registry", provider = provider.name(), type_tag, "Loading type from provider");
            return match self.register(definition, false) {
                Ok(descriptor) => Ok(descriptor),
                // Another thread loaded it first.
                Err(VellumError::DuplicateRegistration { .. }) => self
                    .lookup(type_tag)
                    .ok_or_else(|| VellumError::type_not_found(type_tag)),
                Err(e) => Err(e),
            };
        }

        Err(VellumError::type_not_found(type_tag))
    }

    /// Cache-only lookup
    pub fn lookup(&self, type_tag: &str) -> Option<Arc<TypeDescriptor>> {
        self.types.get(type_tag).map(|e| Arc::clone(&e.descriptor))
    }

    /// Whether `type_tag` was registered as temporary
    pub fn is_temporary(&self, type_tag: &str) -> Result<bool> {
        self.resolve(type_tag)?;
        Ok(self.types.get(type_tag).map_or(false, |e| e.temporary))
    }

    /// Install a provider, consulted after those already installed
    pub fn add_provider(&self, provider: Arc<dyn TypeProvider>) {
        debug!(target: "vellum::registry", provider = provider.name(), "Added type provider");
        self.providers.write().push(provider);
    }

    /// Tags currently registered as `base` or one of its descendants
    pub fn subtypes_of(&self, base: &str) -> BTreeSet<String> {
        self.types
            .iter()
            .filter(|e| e.descriptor.is_a(base))
            .map(|e| e.key().clone())
            .collect()
    }

    /// Whether `type_tag` is registered and is `base` or a descendant
    pub fn is_subtype(&self, type_tag: &str, base: &str) -> bool {
        self.lookup(type_tag).map_or(false, |d| d.is_a(base))
    }

    /// Every registered tag
    pub fn registered_tags(&self) -> BTreeSet<String> {
        self.types.iter().map(|e| e.key().clone()).collect()
    }

    /// Start building a record of `type_tag`
    pub fn builder(&self, type_tag: &str) -> Result<RecordBuilder> {
        Ok(RecordBuilder::new(self.resolve(type_tag)?))
    }

    fn registered_subtypes(&self, base: &str) -> Option<BTreeSet<String>> {
        if self.types.contains_key(base) {
            Some(self.subtypes_of(base))
        } else {
            None
        }
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("types", &self.types.len())
            .field("providers", &self.providers.read().len())
            .finish()
    }
}
