use std::io;
use std::sync::Arc;

use super::ValueSerializer;
use crate::error::{Error, Result};
use crate::session::{DeserializerSession, SerializerSession};
use crate::types::TypeRef;
use crate::value::Value;

/// Placeholder cached for a type no serializer could be built for.
///
/// Every use fails with the diagnostic of the original build failure, so
/// repeated attempts fail the same way without building again.
#[derive(Debug)]
pub struct UnsupportedTypeSerializer {
    ty: TypeRef,
    reason: String,
}

impl UnsupportedTypeSerializer {
    pub fn new(ty: &TypeRef, reason: String) -> Self {
        Self {
            ty: Arc::clone(ty),
            reason,
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    fn error(&self) -> Error {
        Error::UnsupportedType {
            type_name: self.ty.name().to_owned(),
            reason: self.reason.clone(),
        }
    }
}

impl ValueSerializer for UnsupportedTypeSerializer {
    fn write_manifest(
        &self,
        _writer: &mut dyn io::Write,
        _session: &mut SerializerSession<'_>,
    ) -> Result<()> {
        Err(self.error())
    }

    fn write_value(
        &self,
        _writer: &mut dyn io::Write,
        _value: &Value,
        _session: &mut SerializerSession<'_>,
    ) -> Result<()> {
        Err(self.error())
    }

    fn read_value(
        &self,
        _reader: &mut dyn io::Read,
        _session: &mut DeserializerSession<'_>,
    ) -> Result<Value> {
        Err(self.error())
    }

    fn element_type(&self) -> &TypeRef {
        &self.ty
    }

    fn with_wire_fields(self: Arc<Self>, _fields: Vec<String>) -> Result<Arc<dyn ValueSerializer>> {
        Err(self.error())
    }
}
