//! Serializer configuration.
//!
//! [`SerializerOptions`] is built in code. [`SerializerConfig`] is the subset
//! that can be loaded from a TOML file and turned into options against a
//! [`TypeRegistry`].

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;

use crate::error::Result;
use crate::factories::SerializerFactory;
use crate::surrogate::Surrogate;
use crate::types::{TypeRef, TypeRegistry};

/// Immutable configuration captured when a [`Serializer`](crate::Serializer)
/// is constructed.
#[derive(Clone)]
#[must_use]
pub struct SerializerOptions {
    version_tolerance: bool,
    preserve_object_references: bool,
    ignore_custom_serialization_contracts: bool,
    surrogates: Vec<Arc<Surrogate>>,
    factories: Vec<Arc<dyn SerializerFactory>>,
    known_types: Vec<TypeRef>,
    types: Arc<TypeRegistry>,
    max_depth: usize,
    session_pool_capacity: usize,
}

impl Default for SerializerOptions {
    fn default() -> Self {
        Self::new(TypeRegistry::new())
    }
}

impl SerializerOptions {
    /// Creates default options resolving types against `types`.
    pub fn new(types: TypeRegistry) -> Self {
        Self {
            version_tolerance: false,
            preserve_object_references: false,
            ignore_custom_serialization_contracts: false,
            surrogates: Vec::new(),
            factories: Vec::new(),
            known_types: Vec::new(),
            types: Arc::new(types),
            max_depth: default_max_depth(),
            session_pool_capacity: default_session_pool_capacity(),
        }
    }

    /// Creates options from a loaded config.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownType`](crate::Error::UnknownType) if a known
    /// type isn't registered in `types`.
    pub fn from_config(config: &SerializerConfig, types: TypeRegistry) -> Result<Self> {
        let known_types = config
            .known_types
            .iter()
            .map(|name| types.resolve(name))
            .collect::<Result<_>>()?;

        Ok(Self::new(types)
            .with_version_tolerance(config.version_tolerance)
            .with_preserve_object_references(config.preserve_object_references)
            .with_ignore_custom_serialization_contracts(
                config.ignore_custom_serialization_contracts,
            )
            .with_known_types(known_types)
            .with_max_depth(config.max_depth)
            .with_session_pool_capacity(config.session_pool_capacity))
    }

    /// Writes version manifests so readers with a different field layout of
    /// the same type can still read the value. Off by default.
    pub fn with_version_tolerance(mut self, enabled: bool) -> Self {
        self.version_tolerance = enabled;
        self
    }

    /// Writes back references for repeated instances, which also makes cyclic
    /// graphs serializable. Off by default.
    pub fn with_preserve_object_references(mut self, enabled: bool) -> Self {
        self.preserve_object_references = enabled;
        self
    }

    /// Serializes types with a custom contract by their fields instead.
    pub fn with_ignore_custom_serialization_contracts(mut self, enabled: bool) -> Self {
        self.ignore_custom_serialization_contracts = enabled;
        self
    }

    /// Adds a surrogate. Earlier surrogates for the same type win.
    pub fn with_surrogate(mut self, surrogate: Surrogate) -> Self {
        self.surrogates.push(Arc::new(surrogate));
        self
    }

    /// Adds a factory. User factories are consulted in order before the
    /// built-in ones.
    pub fn with_factory(mut self, factory: impl SerializerFactory + 'static) -> Self {
        self.factories.push(Arc::new(factory));
        self
    }

    /// Sets the known types. They are written with an indexed manifest
    /// from their first occurrence, with the index being their position.
    pub fn with_known_types(mut self, known_types: Vec<TypeRef>) -> Self {
        self.known_types = known_types;
        self
    }

    /// Sets the maximum nesting depth of a graph. The default is `128`.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Sets how many cleared sessions are kept for reuse per direction.
    /// The default is `16`.
    pub fn with_session_pool_capacity(mut self, capacity: usize) -> Self {
        self.session_pool_capacity = capacity;
        self
    }

    pub fn version_tolerance(&self) -> bool {
        self.version_tolerance
    }

    pub fn preserve_object_references(&self) -> bool {
        self.preserve_object_references
    }

    pub fn ignore_custom_serialization_contracts(&self) -> bool {
        self.ignore_custom_serialization_contracts
    }

    pub fn surrogates(&self) -> &[Arc<Surrogate>] {
        &self.surrogates
    }

    pub fn factories(&self) -> &[Arc<dyn SerializerFactory>] {
        &self.factories
    }

    pub fn known_types(&self) -> &[TypeRef] {
        &self.known_types
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn session_pool_capacity(&self) -> usize {
        self.session_pool_capacity
    }
}

impl fmt::Debug for SerializerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerializerOptions")
            .field("version_tolerance", &self.version_tolerance)
            .field("preserve_object_references", &self.preserve_object_references)
            .field(
                "ignore_custom_serialization_contracts",
                &self.ignore_custom_serialization_contracts,
            )
            .field("surrogates", &self.surrogates)
            .field("factories", &self.factories.len())
            .field(
                "known_types",
                &self.known_types.iter().map(|t| t.name()).collect::<Vec<_>>(),
            )
            .field("max_depth", &self.max_depth)
            .field("session_pool_capacity", &self.session_pool_capacity)
            .finish_non_exhaustive()
    }
}

const fn default_max_depth() -> usize {
    128
}

const fn default_session_pool_capacity() -> usize {
    16
}

/// Serializer settings as loaded from a config file.
///
/// ```toml
/// version_tolerance = true
/// preserve_object_references = true
/// known_types = ["Point", "Point[]"]
/// max_depth = 128
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SerializerConfig {
    #[serde(default)]
    pub version_tolerance: bool,
    #[serde(default)]
    pub preserve_object_references: bool,
    #[serde(default)]
    pub ignore_custom_serialization_contracts: bool,
    /// Type names, resolved against the registry.
    #[serde(default)]
    pub known_types: Vec<String>,
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    #[serde(default = "default_session_pool_capacity")]
    pub session_pool_capacity: usize,
}

impl SerializerConfig {
    /// Parses a config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) if the text is invalid.
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}
