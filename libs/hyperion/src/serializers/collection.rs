use std::io;
use std::sync::Arc;

use super::array::{read_sequence, write_sequence};
use super::manifest::write_type_manifest;
use super::{ValueSerializer, snapshot};
use crate::error::{Error, Result};
use crate::session::{DeserializerSession, SerializerSession};
use crate::types::{TypeKind, TypeRef};
use crate::value::{Object, ObjectData, ObjectRef, Value};

fn check_collection(ty: &TypeRef, immutable: bool) -> Result<TypeRef> {
    match ty.kind() {
        TypeKind::Collection { immutable: i, .. } if *i == immutable => Ok(Arc::clone(ty)),
        _ => Err(Error::mismatch(
            if immutable { "immutable collection type" } else { "collection type" },
            ty.name(),
        )),
    }
}

fn write_elements(
    ty: &TypeRef,
    writer: &mut dyn io::Write,
    value: &Value,
    session: &mut SerializerSession<'_>,
) -> Result<()> {
    let elements = snapshot(value, ty.name(), |data| match data {
        ObjectData::Elements(e) => Some(e.clone()),
        _ => None,
    })?;

    write_sequence(writer, &elements, session)
}

/// Serializer for enumerable collections that can be filled after
/// construction.
#[derive(Debug)]
pub struct CollectionSerializer {
    ty: TypeRef,
}

impl CollectionSerializer {
    /// # Errors
    ///
    /// Returns `Err` if `ty` isn't a mutable collection type.
    pub fn new(ty: &TypeRef) -> Result<Self> {
        Ok(Self {
            ty: check_collection(ty, false)?,
        })
    }
}

impl ValueSerializer for CollectionSerializer {
    fn write_manifest(
        &self,
        writer: &mut dyn io::Write,
        session: &mut SerializerSession<'_>,
    ) -> Result<()> {
        write_type_manifest(writer, &self.ty, session)
    }

    fn write_value(
        &self,
        writer: &mut dyn io::Write,
        value: &Value,
        session: &mut SerializerSession<'_>,
    ) -> Result<()> {
        write_elements(&self.ty, writer, value, session)
    }

    fn read_value(
        &self,
        reader: &mut dyn io::Read,
        session: &mut DeserializerSession<'_>,
    ) -> Result<Value> {
        let object = ObjectRef::new(Object::new(&self.ty));
        let value = Value::Object(object.clone());
        session.register(&value);

        let elements = read_sequence(reader, session)?;
        *object.write().data_mut() = ObjectData::Elements(elements);
        Ok(value)
    }

    fn element_type(&self) -> &TypeRef {
        &self.ty
    }
}

/// Serializer for collections that can only be constructed once all of
/// their elements are known.
///
/// The id of the collection is reserved before its elements are read, so a
/// back reference to it from within its own elements is rejected with
/// [`Error::UnresolvedReference`].
#[derive(Debug)]
pub struct ImmutableCollectionSerializer {
    ty: TypeRef,
}

impl ImmutableCollectionSerializer {
    /// # Errors
    ///
    /// Returns `Err` if `ty` isn't an immutable collection type.
    pub fn new(ty: &TypeRef) -> Result<Self> {
        Ok(Self {
            ty: check_collection(ty, true)?,
        })
    }
}

impl ValueSerializer for ImmutableCollectionSerializer {
    fn write_manifest(
        &self,
        writer: &mut dyn io::Write,
        session: &mut SerializerSession<'_>,
    ) -> Result<()> {
        write_type_manifest(writer, &self.ty, session)
    }

    fn write_value(
        &self,
        writer: &mut dyn io::Write,
        value: &Value,
        session: &mut SerializerSession<'_>,
    ) -> Result<()> {
        write_elements(&self.ty, writer, value, session)
    }

    fn read_value(
        &self,
        reader: &mut dyn io::Read,
        session: &mut DeserializerSession<'_>,
    ) -> Result<Value> {
        let slot = session.reserve();
        let elements = read_sequence(reader, session)?;

        let value = Value::object(Object::with_elements(&self.ty, elements));
        session.fill(slot, &value);
        Ok(value)
    }

    fn element_type(&self) -> &TypeRef {
        &self.ty
    }
}
