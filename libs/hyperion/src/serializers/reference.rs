use std::io;
use std::sync::Arc;

use super::{ValueSerializer, manifest};
use crate::error::{Error, Result};
use crate::session::{DeserializerSession, SerializerSession};
use crate::stream::{ReadExt as _, WriteExt as _};
use crate::types::TypeRef;
use crate::value::Value;

/// Writes back references to instances that were already written in the
/// same session. The body is just the id of the earlier instance.
#[derive(Debug)]
pub struct ObjectReferenceSerializer {
    ty: TypeRef,
}

impl ObjectReferenceSerializer {
    pub fn new(object: &TypeRef) -> Self {
        Self {
            ty: Arc::clone(object),
        }
    }
}

impl ValueSerializer for ObjectReferenceSerializer {
    fn write_manifest(
        &self,
        writer: &mut dyn io::Write,
        _session: &mut SerializerSession<'_>,
    ) -> Result<()> {
        writer.write_u8(manifest::OBJECT_REF)
    }

    fn write_value(
        &self,
        writer: &mut dyn io::Write,
        value: &Value,
        session: &mut SerializerSession<'_>,
    ) -> Result<()> {
        let id = session
            .object_id(value)
            .ok_or_else(|| Error::mismatch("tracked instance", value.type_name()))?;
        writer.write_varint(id)
    }

    fn read_value(
        &self,
        reader: &mut dyn io::Read,
        session: &mut DeserializerSession<'_>,
    ) -> Result<Value> {
        let id = reader.read_varint()?;
        session.resolve(id)
    }

    fn element_type(&self) -> &TypeRef {
        &self.ty
    }
}
