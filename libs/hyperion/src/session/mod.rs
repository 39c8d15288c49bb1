//! Per-call mutable state.
//!
//! A session tracks object identities for reference preservation, types
//! discovered mid-stream, and a scratch buffer. Sessions are never shared
//! between concurrent calls. Their state is drawn from a pool on the
//! [`Serializer`] and cleared when the session ends, whichever way it ends.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::{io, mem};

use crate::error::{Error, Result};
use crate::serializer::Serializer;
use crate::serializers::{ValueSerializer, read_object, write_object};
use crate::stream::{ReadExt as _, SCRATCH_LIMIT};
use crate::value::Value;

mod pool;

pub(crate) use pool::{Pool, Pooled, Recycle};

/// Write-side state of a session.
#[derive(Default)]
pub(crate) struct SerializerState {
    /// Identity of tracked instances to their implicit id.
    objects: HashMap<usize, u32>,
    /// Tracked instances are kept alive so their addresses can't be reused
    /// by another instance within the same session.
    keep_alive: Vec<Value>,
    /// Discovered type names to their index.
    types: HashMap<Box<str>, u16>,
    ancestors: HashSet<usize>,
    depth: usize,
    scratch: Vec<u8>,
}

impl Recycle for SerializerState {
    fn recycle(&mut self) {
        self.objects.clear();
        self.keep_alive.clear();
        self.types.clear();
        self.ancestors.clear();
        self.depth = 0;
        self.scratch.clear();
    }
}

/// Read-side state of a session.
#[derive(Default)]
pub(crate) struct DeserializerState {
    /// Registered objects by id. `None` marks a reserved slot whose object
    /// is still being constructed.
    objects: Vec<Option<Value>>,
    /// Serializers of discovered types, by index past the known types.
    types: Vec<Arc<dyn ValueSerializer>>,
    suppress_next: bool,
    depth: usize,
    scratch: Vec<u8>,
}

impl Recycle for DeserializerState {
    fn recycle(&mut self) {
        self.objects.clear();
        self.types.clear();
        self.suppress_next = false;
        self.depth = 0;
        self.scratch.clear();
    }
}

/// State for writing one or more values into a single stream.
///
/// Reference ids and type indices are shared by all values written through
/// the same session, so a stream written with one session must be read back
/// with one [`DeserializerSession`].
pub struct SerializerSession<'a> {
    serializer: &'a Serializer,
    state: Pooled<'a, SerializerState>,
}

impl<'a> SerializerSession<'a> {
    pub(crate) fn new(serializer: &'a Serializer, state: Pooled<'a, SerializerState>) -> Self {
        Self { serializer, state }
    }

    pub fn serializer(&self) -> &'a Serializer {
        self.serializer
    }

    /// Writes a value, including its manifest, to `writer`.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the value's type is unsupported, the graph is cyclic
    /// without reference preservation, or writing failed.
    pub fn serialize<W: io::Write>(&mut self, mut writer: W, value: &Value) -> Result<()> {
        write_object(&mut writer, value, self)
    }

    pub(crate) fn preserve_references(&self) -> bool {
        self.serializer.options().preserve_object_references()
    }

    /// Gets the id of an already tracked instance.
    pub(crate) fn object_id(&self, value: &Value) -> Option<u32> {
        let identity = value.identity()?;
        self.state.objects.get(&identity).copied()
    }

    /// Assigns the next id to an instance.
    pub(crate) fn track(&mut self, value: &Value) -> Result<u32> {
        let Some(identity) = value.identity() else {
            return Err(Error::mismatch("reference value", value.type_name()));
        };

        let id = u32::try_from(self.state.objects.len()).map_err(|_| Error::IntegerOverflow)?;
        if self.state.objects.insert(identity, id).is_some() {
            return Err(Error::DuplicateTracking);
        }

        self.state.keep_alive.push(value.clone());
        Ok(id)
    }

    /// Gets the indexed manifest id of a known or previously written type.
    pub(crate) fn type_index(&self, name: &str) -> Option<u16> {
        self.serializer
            .known_type_index(name)
            .or_else(|| self.state.types.get(name).copied())
    }

    /// Assigns the next type index to a type written with a full manifest.
    pub(crate) fn discover(&mut self, name: &str) -> Result<()> {
        let index = self.serializer.known_types().len() + self.state.types.len();
        let index = u16::try_from(index).map_err(|_| Error::TooManyTypes)?;
        self.state.types.insert(name.into(), index);
        Ok(())
    }

    /// Enters one nesting level for `value`.
    pub(crate) fn enter(&mut self, value: &Value) -> Result<()> {
        let max_depth = self.serializer.options().max_depth();
        if self.state.depth >= max_depth {
            return Err(Error::DepthLimitExceeded(max_depth));
        }

        if let Value::Object(o) = value
            && !self.preserve_references()
            && !self.state.ancestors.insert(o.identity())
        {
            return Err(Error::CycleDetected(o.type_info().name().to_owned()));
        }

        self.state.depth += 1;
        Ok(())
    }

    /// Leaves the nesting level entered for `value`.
    pub(crate) fn leave(&mut self, value: &Value) {
        if let Value::Object(o) = value {
            self.state.ancestors.remove(&o.identity());
        }

        self.state.depth = self.state.depth.saturating_sub(1);
    }

    /// Takes the cleared scratch buffer with at least `min` capacity.
    ///
    /// Hand it back with [`Self::put_scratch`] to keep the allocation.
    pub(crate) fn take_scratch(&mut self, min: usize) -> Vec<u8> {
        let mut buf = mem::take(&mut self.state.scratch);
        buf.clear();
        grow_doubling(&mut buf, min);
        buf
    }

    pub(crate) fn put_scratch(&mut self, buf: Vec<u8>) {
        self.state.scratch = buf;
    }
}

/// State for reading one or more values from a single stream.
pub struct DeserializerSession<'a> {
    serializer: &'a Serializer,
    state: Pooled<'a, DeserializerState>,
}

impl<'a> DeserializerSession<'a> {
    pub(crate) fn new(serializer: &'a Serializer, state: Pooled<'a, DeserializerState>) -> Self {
        Self { serializer, state }
    }

    pub fn serializer(&self) -> &'a Serializer {
        self.serializer
    }

    /// Reads the next value from `reader`.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the data is malformed, refers to unknown types or
    /// objects, or reading failed.
    pub fn deserialize<R: io::Read>(&mut self, mut reader: R) -> Result<Value> {
        read_object(&mut reader, self)
    }

    pub(crate) fn preserve_references(&self) -> bool {
        self.serializer.options().preserve_object_references()
    }

    /// Registers a freshly allocated instance under the next id.
    ///
    /// Must be called before any nested value is read so back references
    /// to the instance resolve.
    pub fn register(&mut self, value: &Value) {
        if self.preserve_references() && !mem::take(&mut self.state.suppress_next) {
            self.state.objects.push(Some(value.clone()));
        }
    }

    /// Reserves the next id for an instance that can only be constructed
    /// after its content was read.
    pub fn reserve(&mut self) -> Option<usize> {
        if self.preserve_references() && !mem::take(&mut self.state.suppress_next) {
            let slot = self.state.objects.len();
            self.state.objects.push(None);
            Some(slot)
        } else {
            None
        }
    }

    /// Fills a slot previously returned by [`Self::reserve`].
    pub fn fill(&mut self, slot: Option<usize>, value: &Value) {
        if let Some(entry) = slot.and_then(|s| self.state.objects.get_mut(s)) {
            *entry = Some(value.clone());
        }
    }

    /// Makes the next registration or reservation a no-op.
    ///
    /// Used while reading a surrogate carrier: the id belongs to the
    /// original instance, which was reserved beforehand.
    pub(crate) fn suppress_next_registration(&mut self) {
        self.state.suppress_next = true;
    }

    pub(crate) fn clear_suppression(&mut self) {
        self.state.suppress_next = false;
    }

    /// Resolves an object reference id.
    pub(crate) fn resolve(&self, id: u32) -> Result<Value> {
        let slot = usize::try_from(id).map_err(|_| Error::DanglingReference(id))?;
        match self.state.objects.get(slot) {
            Some(Some(value)) => Ok(value.clone()),
            Some(None) => Err(Error::UnresolvedReference(id)),
            None => Err(Error::DanglingReference(id)),
        }
    }

    /// Records the serializer for a type read with a full or version
    /// manifest.
    pub(crate) fn discover(&mut self, serializer: Arc<dyn ValueSerializer>) {
        self.state.types.push(serializer);
    }

    /// Resolves an indexed manifest.
    pub(crate) fn type_at(&self, index: u16) -> Result<Arc<dyn ValueSerializer>> {
        let known = self.serializer.known_types();
        let i = usize::from(index);
        if let Some(ty) = known.get(i) {
            return Ok(self.serializer.deserializer_for(ty));
        }

        self.state
            .types
            .get(i - known.len())
            .cloned()
            .ok_or(Error::UnknownTypeIndex(index))
    }

    pub(crate) fn enter(&mut self) -> Result<()> {
        let max_depth = self.serializer.options().max_depth();
        if self.state.depth >= max_depth {
            return Err(Error::DepthLimitExceeded(max_depth));
        }

        self.state.depth += 1;
        Ok(())
    }

    pub(crate) fn leave(&mut self) {
        self.state.depth = self.state.depth.saturating_sub(1);
    }

    /// Reads a length-prefixed UTF-8 string.
    pub(crate) fn read_str(&mut self, reader: &mut dyn io::Read) -> Result<Arc<str>> {
        let len = reader.read_len()?;
        if len > SCRATCH_LIMIT {
            let buf = reader.read_byte_vec(len)?;
            let s = String::from_utf8(buf).map_err(|_| Error::InvalidUtf8)?;
            return Ok(Arc::from(s));
        }

        let buf = self.scratch(len);
        reader.read_exact(buf)?;
        let s = std::str::from_utf8(buf).map_err(|_| Error::InvalidUtf8)?;
        Ok(Arc::from(s))
    }

    /// Reads a length-prefixed byte array.
    pub(crate) fn read_blob(&mut self, reader: &mut dyn io::Read) -> Result<Arc<[u8]>> {
        let len = reader.read_len()?;
        if len > SCRATCH_LIMIT {
            return Ok(Arc::from(reader.read_byte_vec(len)?));
        }

        let buf = self.scratch(len);
        reader.read_exact(buf)?;
        Ok(Arc::from(&*buf))
    }

    fn scratch(&mut self, len: usize) -> &mut [u8] {
        let buf = &mut self.state.scratch;
        if buf.len() < len {
            grow_doubling(buf, len);
            buf.resize(buf.capacity(), 0);
        }

        &mut buf[..len]
    }
}

/// Grows `buf` to at least `min` capacity, at least doubling it.
fn grow_doubling(buf: &mut Vec<u8>, min: usize) {
    let cap = buf.capacity();
    if cap < min {
        let target = min.max(cap.saturating_mul(2)).max(64);
        buf.reserve_exact(target - buf.len());
    }
}
