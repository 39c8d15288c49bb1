use std::io;
use std::sync::Arc;

use super::manifest::{self, write_type_manifest};
use super::primitive::{read_body, write_body};
use super::{ValueSerializer, read_object, snapshot, write_object};
use crate::error::{Error, Result};
use crate::session::{DeserializerSession, SerializerSession};
use crate::stream::{ReadExt as _, WriteExt as _};
use crate::types::{Primitive, TypeKind, TypeRef};
use crate::value::{Object, ObjectData, ObjectRef, Value};

fn elements(value: &Value, ty: &TypeRef) -> Result<Vec<Value>> {
    snapshot(value, ty.name(), |data| match data {
        ObjectData::Elements(e) => Some(e.clone()),
        _ => None,
    })
}

/// Serializer for arrays whose element type is a value type primitive.
///
/// The element manifest is written once, followed by the raw element bodies.
#[derive(Debug)]
pub struct ConsistentArraySerializer {
    ty: TypeRef,
    element: Primitive,
}

impl ConsistentArraySerializer {
    /// Creates the serializer for an array type, if its element is a value
    /// type primitive.
    pub fn new(ty: &TypeRef) -> Option<Self> {
        let TypeKind::Array { element } = ty.kind() else {
            return None;
        };

        let element = element.primitive().filter(|p| p.is_value_type())?;
        Some(Self {
            ty: Arc::clone(ty),
            element,
        })
    }
}

impl ValueSerializer for ConsistentArraySerializer {
    fn write_manifest(
        &self,
        writer: &mut dyn io::Write,
        _session: &mut SerializerSession<'_>,
    ) -> Result<()> {
        writer.write_u8(manifest::CONSISTENT_ARRAY)?;
        writer.write_u8(self.element.manifest())
    }

    fn write_value(
        &self,
        writer: &mut dyn io::Write,
        value: &Value,
        session: &mut SerializerSession<'_>,
    ) -> Result<()> {
        let elements = elements(value, &self.ty)?;
        writer.write_varint(elements.len())?;

        // bodies are small, so batch them into a single write
        let mut buf = session.take_scratch(elements.len());
        let res = elements
            .iter()
            .try_for_each(|e| write_body(&mut buf, self.element, e));
        if res.is_ok() {
            writer.write_all(&buf)?;
        }

        session.put_scratch(buf);
        res
    }

    fn read_value(
        &self,
        reader: &mut dyn io::Read,
        session: &mut DeserializerSession<'_>,
    ) -> Result<Value> {
        let len = reader.read_len()?;
        let mut elements = Vec::with_capacity(len.min(0x1000));
        for _ in 0..len {
            elements.push(read_body(reader, self.element)?);
        }

        // no nested value registers, so registering last keeps the ids aligned
        let value = Value::object(Object::with_elements(&self.ty, elements));
        session.register(&value);
        Ok(value)
    }

    fn element_type(&self) -> &TypeRef {
        &self.ty
    }
}

/// Serializer for arrays of any other element type.
///
/// Every element is written with its own manifest, so arrays of polymorphic
/// elements round trip.
#[derive(Debug)]
pub struct ArraySerializer {
    ty: TypeRef,
}

impl ArraySerializer {
    /// # Errors
    ///
    /// Returns `Err` if `ty` isn't an array type.
    pub fn new(ty: &TypeRef) -> Result<Self> {
        match ty.kind() {
            TypeKind::Array { .. } => Ok(Self { ty: Arc::clone(ty) }),
            _ => Err(Error::mismatch("array type", ty.name())),
        }
    }
}

impl ValueSerializer for ArraySerializer {
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
        write_sequence(writer, &elements(value, &self.ty)?, session)
    }

    fn read_value(
        &self,
        reader: &mut dyn io::Read,
        session: &mut DeserializerSession<'_>,
    ) -> Result<Value> {
        let object = ObjectRef::new(Object::with_elements(&self.ty, Vec::new()));
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

/// Writes a length-prefixed sequence of values with manifests.
pub(super) fn write_sequence(
    writer: &mut dyn io::Write,
    elements: &[Value],
    session: &mut SerializerSession<'_>,
) -> Result<()> {
    writer.write_varint(elements.len())?;
    for element in elements {
        write_object(writer, element, session)?;
    }

    Ok(())
}

/// Reads a sequence written by [`write_sequence`].
pub(super) fn read_sequence(
    reader: &mut dyn io::Read,
    session: &mut DeserializerSession<'_>,
) -> Result<Vec<Value>> {
    let len = reader.read_len()?;
    let mut elements = Vec::with_capacity(len.min(0x1000));
    for _ in 0..len {
        elements.push(read_object(reader, session)?);
    }

    Ok(elements)
}
