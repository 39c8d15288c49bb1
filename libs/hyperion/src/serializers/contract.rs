use std::io;
use std::sync::Arc;

use super::manifest::write_type_manifest;
use super::{ValueSerializer, read_object, write_object};
use crate::error::{Error, Result};
use crate::session::{DeserializerSession, SerializerSession};
use crate::stream::{ReadExt as _, WriteExt as _};
use crate::types::{SerializationContract, TypeRef};
use crate::value::Value;

/// Serializer for struct types with a custom [`SerializationContract`].
///
/// The body is a list of named entries. The instance is only constructed
/// once all entries were read, so back references into it from its own
/// entries are rejected.
pub struct ContractSerializer {
    ty: TypeRef,
    contract: Arc<dyn SerializationContract>,
}

impl ContractSerializer {
    /// # Errors
    ///
    /// Returns `Err` if `ty` has no custom contract.
    pub fn new(ty: &TypeRef) -> Result<Self> {
        let contract = ty
            .as_struct()
            .and_then(|s| s.contract())
            .ok_or_else(|| Error::mismatch("type with serialization contract", ty.name()))?;

        Ok(Self {
            ty: Arc::clone(ty),
            contract: Arc::clone(contract),
        })
    }
}

impl ValueSerializer for ContractSerializer {
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
        let object = value
            .as_object()
            .ok_or_else(|| Error::mismatch(self.ty.name(), value.type_name()))?;

        // the lock is released before any entry is written
        let entries = self.contract.write_entries(&object.read())?;

        writer.write_varint(entries.len())?;
        for (name, entry) in &entries {
            writer.write_length_prefixed(name.as_bytes())?;
            write_object(writer, entry, session)?;
        }

        Ok(())
    }

    fn read_value(
        &self,
        reader: &mut dyn io::Read,
        session: &mut DeserializerSession<'_>,
    ) -> Result<Value> {
        let slot = session.reserve();

        let len = reader.read_len()?;
        let mut entries = Vec::with_capacity(len.min(0x100));
        for _ in 0..len {
            let name = reader.read_name()?;
            entries.push((name, read_object(reader, session)?));
        }

        let value = Value::object(self.contract.read_entries(&self.ty, entries)?);
        session.fill(slot, &value);
        Ok(value)
    }

    fn element_type(&self) -> &TypeRef {
        &self.ty
    }
}
