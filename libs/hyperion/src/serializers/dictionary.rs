use std::io;
use std::sync::Arc;

use super::manifest::write_type_manifest;
use super::{ValueSerializer, read_object, snapshot, write_object};
use crate::error::{Error, Result};
use crate::session::{DeserializerSession, SerializerSession};
use crate::stream::{ReadExt as _, WriteExt as _};
use crate::types::{TypeKind, TypeRef};
use crate::value::{Object, ObjectData, ObjectRef, Value};

/// Serializer for dictionary types, written as a sequence of key/value pairs
/// that each carry their own manifest.
#[derive(Debug)]
pub struct DictionarySerializer {
    ty: TypeRef,
}

impl DictionarySerializer {
    /// # Errors
    ///
    /// Returns `Err` if `ty` isn't a dictionary type.
    pub fn new(ty: &TypeRef) -> Result<Self> {
        match ty.kind() {
            TypeKind::Dictionary { .. } => Ok(Self { ty: Arc::clone(ty) }),
            _ => Err(Error::mismatch("dictionary type", ty.name())),
        }
    }
}

impl ValueSerializer for DictionarySerializer {
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
        let entries = snapshot(value, self.ty.name(), |data| match data {
            ObjectData::Entries(e) => Some(e.clone()),
            _ => None,
        })?;

        writer.write_varint(entries.len())?;
        for (key, item) in &entries {
            write_object(writer, key, session)?;
            write_object(writer, item, session)?;
        }

        Ok(())
    }

    fn read_value(
        &self,
        reader: &mut dyn io::Read,
        session: &mut DeserializerSession<'_>,
    ) -> Result<Value> {
        let object = ObjectRef::new(Object::with_entries(&self.ty, Vec::new()));
        let value = Value::Object(object.clone());
        session.register(&value);

        let len = reader.read_len()?;
        let mut entries = Vec::with_capacity(len.min(0x1000));
        for _ in 0..len {
            let key = read_object(reader, session)?;
            let item = read_object(reader, session)?;
            entries.push((key, item));
        }

        *object.write().data_mut() = ObjectData::Entries(entries);
        Ok(value)
    }

    fn element_type(&self) -> &TypeRef {
        &self.ty
    }
}
