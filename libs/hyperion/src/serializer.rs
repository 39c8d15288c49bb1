//! The serializer registry.

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::sync::atomic::{AtomicBool, Ordering};

use arc_swap::ArcSwap;
use dashmap::DashMap;

use crate::error::{Error, Result};
use crate::factories::{self, SerializerFactory};
use crate::options::SerializerOptions;
use crate::serializers::{
    ConsistentArraySerializer, ObjectReferenceSerializer, ObjectSerializer, PrimitiveSerializer,
    SurrogateSerializer, UnsupportedTypeSerializer, ValueSerializer, read_object,
};
use crate::session::{
    DeserializerSession, DeserializerState, Pool, SerializerSession, SerializerState,
};
use crate::surrogate::Surrogate;
use crate::types::{Primitive, TypeInfo, TypeKind, TypeRef, TypeRegistry};
use crate::value::Value;

type SerializerTable = Box<[Option<Arc<dyn ValueSerializer>>]>;
type SerializerCache = DashMap<Box<str>, Arc<dyn ValueSerializer>>;

#[derive(Debug, Clone, Copy)]
enum Direction {
    Serialize,
    Deserialize,
}

impl Direction {
    fn noun(self) -> &'static str {
        match self {
            Self::Serialize => "serializer",
            Self::Deserialize => "deserializer",
        }
    }
}

/// Owns the serializers of all types and the session pools.
///
/// A serializer can be shared between threads. Each call draws its own
/// session state from a pool, and serializers for new types are built on
/// first use and cached for the lifetime of the serializer. Once a type has
/// a serializer, it is never replaced.
///
/// Factories and surrogates can be added with [`Self::register_factory`] and
/// [`Self::register_surrogate`] until the first session is started or the
/// first serializer is built.
pub struct Serializer {
    options: SerializerOptions,
    /// Serializers selected directly by manifest byte.
    primitives: SerializerTable,
    /// Consistent array serializers by element manifest byte.
    consistent_arrays: SerializerTable,
    object_reference: Arc<ObjectReferenceSerializer>,
    serializers: SerializerCache,
    deserializers: SerializerCache,
    known_index: HashMap<Box<str>, u16>,
    factories: ArcSwap<Vec<Arc<dyn SerializerFactory>>>,
    builtin_factories: Vec<Arc<dyn SerializerFactory>>,
    surrogates: ArcSwap<Vec<Arc<Surrogate>>>,
    frozen: AtomicBool,
    /// Held while registering and while freezing.
    registration: Mutex<()>,
    serializer_pool: Pool<SerializerState>,
    deserializer_pool: Pool<DeserializerState>,
}

impl Serializer {
    /// Creates a new serializer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TooManyTypes`] if there are more known types than an
    /// indexed manifest can address.
    pub fn new(options: SerializerOptions) -> Result<Self> {
        let types = options.types();

        let mut primitives: Vec<Option<Arc<dyn ValueSerializer>>> = vec![None; 256];
        let mut consistent_arrays: Vec<Option<Arc<dyn ValueSerializer>>> = vec![None; 256];
        for p in Primitive::ALL {
            let ty = types.primitive(p);
            let index = usize::from(p.manifest());
            primitives[index] = PrimitiveSerializer::new(ty)
                .map(|s| Arc::new(s) as Arc<dyn ValueSerializer>);
            consistent_arrays[index] = ConsistentArraySerializer::new(&TypeInfo::array_of(ty))
                .map(|s| Arc::new(s) as Arc<dyn ValueSerializer>);
        }

        let mut known_index = HashMap::with_capacity(options.known_types().len());
        for (index, ty) in options.known_types().iter().enumerate() {
            let index = u16::try_from(index).map_err(|_| Error::TooManyTypes)?;
            known_index.entry(ty.name().into()).or_insert(index);
        }

        let object_reference = Arc::new(ObjectReferenceSerializer::new(types.object()));
        let builtin_factories = factories::builtins(&options);
        let factories = ArcSwap::from_pointee(options.factories().to_vec());
        let surrogates = ArcSwap::from_pointee(options.surrogates().to_vec());
        let pool_capacity = options.session_pool_capacity();

        Ok(Self {
            options,
            primitives: primitives.into_boxed_slice(),
            consistent_arrays: consistent_arrays.into_boxed_slice(),
            object_reference,
            serializers: DashMap::new(),
            deserializers: DashMap::new(),
            known_index,
            factories,
            builtin_factories,
            surrogates,
            frozen: AtomicBool::new(false),
            registration: Mutex::new(()),
            serializer_pool: Pool::new(pool_capacity),
            deserializer_pool: Pool::new(pool_capacity),
        })
    }

    pub fn options(&self) -> &SerializerOptions {
        &self.options
    }

    pub fn types(&self) -> &TypeRegistry {
        self.options.types()
    }

    pub fn known_types(&self) -> &[TypeRef] {
        self.options.known_types()
    }

    /// Gets the indexed manifest id of a known type.
    pub fn known_type_index(&self, name: &str) -> Option<u16> {
        self.known_index.get(name).copied()
    }

    /// Adds a factory ahead of the built-in ones, after earlier user
    /// factories.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Frozen`] if the serializer was already used.
    pub fn register_factory(&self, factory: impl SerializerFactory + 'static) -> Result<()> {
        let _guard = self.lock_unfrozen("factory")?;
        let factory: Arc<dyn SerializerFactory> = Arc::new(factory);
        let mut list = Vec::clone(&self.factories.load());
        list.push(factory);
        self.factories.store(Arc::new(list));
        Ok(())
    }

    /// Adds a surrogate.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Frozen`] if the serializer was already used.
    pub fn register_surrogate(&self, surrogate: Surrogate) -> Result<()> {
        let _guard = self.lock_unfrozen("surrogate")?;
        let mut list = Vec::clone(&self.surrogates.load());
        list.push(Arc::new(surrogate));
        self.surrogates.store(Arc::new(list));
        Ok(())
    }

    /// Locks registration, failing if the serializer is frozen.
    ///
    /// Freezing takes the same lock, so the lists never change after a
    /// build has started.
    fn lock_unfrozen(&self, what: &str) -> Result<MutexGuard<'_, ()>> {
        let guard = self
            .registration
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if self.frozen.load(Ordering::Acquire) {
            log::warn!("Rejected {what} registration after the serializer was first used.");
            return Err(Error::Frozen);
        }

        Ok(guard)
    }

    fn freeze(&self) {
        if self.frozen.load(Ordering::Acquire) {
            return;
        }

        let _guard = self
            .registration
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.frozen.store(true, Ordering::Release);
    }

    /// Starts a session to write one or more values into a single stream.
    pub fn serializer_session(&self) -> SerializerSession<'_> {
        self.freeze();
        SerializerSession::new(self, self.serializer_pool.get())
    }

    /// Starts a session to read one or more values from a single stream.
    pub fn deserializer_session(&self) -> DeserializerSession<'_> {
        self.freeze();
        DeserializerSession::new(self, self.deserializer_pool.get())
    }

    /// Writes a single value to `writer`.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the value's type is unsupported, the graph is cyclic
    /// without reference preservation, or writing failed.
    pub fn serialize<W: io::Write>(&self, writer: W, value: &Value) -> Result<()> {
        self.serializer_session().serialize(writer, value)
    }

    /// Writes a single value into a new buffer.
    ///
    /// # Errors
    ///
    /// Same as [`Self::serialize`].
    pub fn to_vec(&self, value: &Value) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.serialize(&mut buf, value)?;
        Ok(buf)
    }

    /// Reads a single value from `reader`.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the data is malformed, refers to unknown types or
    /// objects, or reading failed.
    pub fn deserialize<R: io::Read>(&self, reader: R) -> Result<Value> {
        self.deserializer_session().deserialize(reader)
    }

    /// Reads a single value from a slice, requiring that all bytes are used.
    ///
    /// # Errors
    ///
    /// Same as [`Self::deserialize`], and returns [`Error::TrailingBytes`]
    /// if not all bytes were consumed.
    pub fn from_slice(&self, mut slice: &[u8]) -> Result<Value> {
        let mut session = self.deserializer_session();
        let value = read_object(&mut slice, &mut session)?;
        if slice.is_empty() {
            Ok(value)
        } else {
            Err(Error::TrailingBytes(slice.len()))
        }
    }

    /// Gets the serializer used to write values of `ty`, building it if
    /// needed.
    ///
    /// If no serializer can be built, a placeholder that always fails with
    /// [`Error::UnsupportedType`] is cached and returned instead.
    pub fn serializer_for(&self, ty: &TypeRef) -> Arc<dyn ValueSerializer> {
        self.cached(&self.serializers, ty, Direction::Serialize)
    }

    /// Gets the serializer used to read values of `ty`, building it if
    /// needed.
    ///
    /// Like [`Self::serializer_for`], failures are cached as placeholders.
    pub fn deserializer_for(&self, ty: &TypeRef) -> Arc<dyn ValueSerializer> {
        self.cached(&self.deserializers, ty, Direction::Deserialize)
    }

    /// Gets the serializer for the runtime type of `value`.
    pub(crate) fn serializer_for_value(&self, value: &Value) -> Result<Arc<dyn ValueSerializer>> {
        if let Value::Object(o) = value {
            return Ok(self.serializer_for(&o.type_info()));
        }

        let p = value
            .primitive()
            .ok_or_else(|| Error::mismatch("non-null value", value.type_name()))?;
        self.primitive(p.manifest())
    }

    /// Gets the serializer selected directly by a manifest byte.
    pub(crate) fn primitive(&self, tag: u8) -> Result<Arc<dyn ValueSerializer>> {
        self.primitives
            .get(usize::from(tag))
            .and_then(Option::clone)
            .ok_or(Error::UnknownManifest(tag))
    }

    /// Gets the consistent array serializer for an element manifest byte.
    pub(crate) fn consistent_array(&self, element: u8) -> Result<Arc<dyn ValueSerializer>> {
        self.consistent_arrays
            .get(usize::from(element))
            .and_then(Option::clone)
            .ok_or(Error::UnknownManifest(element))
    }

    pub(crate) fn object_reference(&self) -> &Arc<ObjectReferenceSerializer> {
        &self.object_reference
    }

    fn cached(
        &self,
        cache: &SerializerCache,
        ty: &TypeRef,
        direction: Direction,
    ) -> Arc<dyn ValueSerializer> {
        if let Some(p) = ty.primitive()
            && let Ok(serializer) = self.primitive(p.manifest())
        {
            return serializer;
        }

        if let Some(serializer) = cache.get(ty.name()) {
            return Arc::clone(&serializer);
        }

        // build outside of any shard lock; if another thread was faster, its
        // serializer is kept and this one is discarded
        let built = self.build(ty, direction);
        let entry = cache.entry(ty.name().into()).or_insert(built);
        Arc::clone(entry.value())
    }

    fn build(&self, ty: &TypeRef, direction: Direction) -> Arc<dyn ValueSerializer> {
        self.freeze();
        match self.try_build(ty, direction) {
            Ok(serializer) => {
                log::debug!("Built {} for `{}`.", direction.noun(), ty.name());
                serializer
            },
            Err(why) => {
                log::warn!("Type `{}` is not supported: {why}", ty.name());
                Arc::new(UnsupportedTypeSerializer::new(ty, why.to_string()))
            },
        }
    }

    fn try_build(&self, ty: &TypeRef, direction: Direction) -> Result<Arc<dyn ValueSerializer>> {
        if let Some(surrogate) = self.surrogates.load().iter().find(|s| s.applies_to(ty)) {
            return Ok(Arc::new(SurrogateSerializer::new(ty, surrogate)));
        }

        let user = self.factories.load();
        for factory in user.iter().chain(&self.builtin_factories) {
            let applies = match direction {
                Direction::Serialize => factory.can_serialize(self, ty),
                Direction::Deserialize => factory.can_deserialize(self, ty),
            };

            if applies {
                return factory.build(self, ty);
            }
        }

        match ty.kind() {
            TypeKind::Struct(_) => Ok(Arc::new(ObjectSerializer::new(self, ty)?)),
            TypeKind::Any => Err(Error::custom("`object` is only valid as a declared type")),
            TypeKind::Opaque => Err(Error::custom(
                "native type without field layout needs a surrogate or factory",
            )),
            _ => Err(Error::custom("no factory handles this type")),
        }
    }
}

impl fmt::Debug for Serializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Serializer")
            .field("options", &self.options)
            .field("serializers", &self.serializers.len())
            .field("deserializers", &self.deserializers.len())
            .field("frozen", &self.frozen.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
