//! Value serializers: the per-type units that write and read a manifest and
//! a value body.
//!
//! Nested values always go through [`write_object`] and [`read_object`],
//! which handle null, reference preservation, and manifest dispatch before
//! handing the body to the serializer of the value's type.

use std::io;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::session::{DeserializerSession, SerializerSession};
use crate::stream::{ReadExt as _, WriteExt as _};
use crate::types::TypeRef;
use crate::value::Value;

mod array;
mod collection;
mod contract;
mod delegate;
mod dictionary;
pub mod manifest;
mod member;
mod object;
mod primitive;
mod reference;
mod surrogate;
mod unsupported;

pub use array::{ArraySerializer, ConsistentArraySerializer};
pub use collection::{CollectionSerializer, ImmutableCollectionSerializer};
pub use contract::ContractSerializer;
pub use delegate::DelegateSerializer;
pub use dictionary::DictionarySerializer;
pub use member::MemberSerializer;
pub use object::{FieldFilter, ObjectSerializer, SYNC_ROOT_FIELD};
pub use primitive::PrimitiveSerializer;
pub use reference::ObjectReferenceSerializer;
pub use surrogate::SurrogateSerializer;
pub use unsupported::UnsupportedTypeSerializer;

/// Writes and reads values of one type.
///
/// Implementations are shared between threads and must not hold per-call
/// state. All per-call state lives in the session.
pub trait ValueSerializer: Send + Sync {
    /// Writes the manifest that tells a reader how to resolve this
    /// serializer.
    ///
    /// # Errors
    ///
    /// Returns `Err` if writing failed or the type can't be serialized.
    fn write_manifest(
        &self,
        writer: &mut dyn io::Write,
        session: &mut SerializerSession<'_>,
    ) -> Result<()>;

    /// Writes the body of `value`, without its manifest.
    ///
    /// # Errors
    ///
    /// Returns `Err` if writing failed or `value` doesn't have the expected
    /// shape.
    fn write_value(
        &self,
        writer: &mut dyn io::Write,
        value: &Value,
        session: &mut SerializerSession<'_>,
    ) -> Result<()>;

    /// Reads a body written by [`Self::write_value`].
    ///
    /// Serializers of reference types must register the new instance with
    /// the session before reading any nested value.
    ///
    /// # Errors
    ///
    /// Returns `Err` if reading failed or the data is malformed.
    fn read_value(
        &self,
        reader: &mut dyn io::Read,
        session: &mut DeserializerSession<'_>,
    ) -> Result<Value>;

    /// The type this serializer handles.
    fn element_type(&self) -> &TypeRef;

    /// Adapts this serializer to read bodies written with the given field
    /// names, as announced by a version manifest.
    ///
    /// # Errors
    ///
    /// By default, returns [`Error::ManifestMismatch`].
    fn with_wire_fields(self: Arc<Self>, _fields: Vec<String>) -> Result<Arc<dyn ValueSerializer>> {
        Err(Error::ManifestMismatch(self.element_type().name().to_owned()))
    }
}

/// Writes any value including its manifest.
///
/// # Errors
///
/// Returns `Err` if the value's type is unsupported, the graph is cyclic
/// without reference preservation, or writing failed.
pub fn write_object(
    writer: &mut dyn io::Write,
    value: &Value,
    session: &mut SerializerSession<'_>,
) -> Result<()> {
    if value.is_null() {
        return writer.write_u8(manifest::NULL);
    }

    if session.preserve_references() && value.identity().is_some() {
        if session.object_id(value).is_some() {
            let reference = session.serializer().object_reference();
            reference.write_manifest(writer, session)?;
            return reference.write_value(writer, value, session);
        }

        session.track(value)?;
    }

    let serializer = session.serializer().serializer_for_value(value)?;

    session.enter(value)?;
    let res = serializer
        .write_manifest(writer, session)
        .and_then(|()| serializer.write_value(writer, value, session));
    session.leave(value);
    res
}

/// Reads any value including its manifest.
///
/// # Errors
///
/// Returns `Err` if the data is malformed, refers to unknown types or
/// objects, or reading failed.
pub fn read_object(
    reader: &mut dyn io::Read,
    session: &mut DeserializerSession<'_>,
) -> Result<Value> {
    let tag = reader.read_u8()?;
    let serializer = match tag {
        manifest::NULL => return Ok(Value::Null),
        manifest::OBJECT_REF => {
            let reference = session.serializer().object_reference();
            return reference.read_value(reader, session);
        },
        manifest::CONSISTENT_ARRAY => {
            let element = reader.read_u8()?;
            session.serializer().consistent_array(element)?
        },
        manifest::FULL => {
            let name = reader.read_name()?;
            let ty = session.serializer().types().resolve(&name)?;
            let serializer = session.serializer().deserializer_for(&ty);
            session.discover(Arc::clone(&serializer));
            serializer
        },
        manifest::VERSION => {
            let name = reader.read_name()?;
            let fields = manifest::read_names(reader)?;
            let ty = session.serializer().types().resolve(&name)?;
            let serializer = session
                .serializer()
                .deserializer_for(&ty)
                .with_wire_fields(fields)?;
            session.discover(Arc::clone(&serializer));
            serializer
        },
        manifest::INDEXED => {
            let index = u16::from_le_bytes(reader.read_bytes()?);
            session.type_at(index)?
        },
        tag => session.serializer().primitive(tag)?,
    };

    session.enter()?;
    let res = serializer.read_value(reader, session);
    session.leave();
    res
}

/// Snapshots the content of an object so no lock is held while nested
/// values are written.
fn snapshot<T>(
    value: &Value,
    expected: &str,
    f: impl FnOnce(&crate::value::ObjectData) -> Option<T>,
) -> Result<T> {
    value
        .as_object()
        .and_then(|o| f(o.read().data()))
        .ok_or_else(|| Error::mismatch(expected, value.type_name()))
}
