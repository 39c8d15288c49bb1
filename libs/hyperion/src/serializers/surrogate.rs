use std::io;
use std::sync::Arc;

use super::{ValueSerializer, read_object};
use super::manifest::write_type_manifest;
use crate::error::{Error, Result};
use crate::session::{DeserializerSession, SerializerSession};
use crate::surrogate::Surrogate;
use crate::types::TypeRef;
use crate::value::Value;

/// Serializes a type through the carrier of its [`Surrogate`].
///
/// The manifest names the original type. The body is the carrier value with
/// its own manifest, so the reader follows whatever layout the carrier type
/// was written with. The carrier is never tracked: its id belongs to the
/// original value.
#[derive(Debug)]
pub struct SurrogateSerializer {
    ty: TypeRef,
    surrogate: Arc<Surrogate>,
}

impl SurrogateSerializer {
    pub fn new(ty: &TypeRef, surrogate: &Arc<Surrogate>) -> Self {
        Self {
            ty: Arc::clone(ty),
            surrogate: Arc::clone(surrogate),
        }
    }
}

impl ValueSerializer for SurrogateSerializer {
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
        let carrier = self.surrogate.to_surrogate(value)?;
        if carrier.is_null() {
            return Err(Error::mismatch(self.surrogate.carrier().name(), "null"));
        }

        let serializer = session.serializer().serializer_for_value(&carrier)?;
        session.enter(&carrier)?;
        let res = serializer
            .write_manifest(writer, session)
            .and_then(|()| serializer.write_value(writer, &carrier, session));
        session.leave(&carrier);
        res
    }

    fn read_value(
        &self,
        reader: &mut dyn io::Read,
        session: &mut DeserializerSession<'_>,
    ) -> Result<Value> {
        let slot = session.reserve();

        session.suppress_next_registration();
        let carrier = read_object(reader, session);
        session.clear_suppression();

        let value = self.surrogate.from_surrogate(carrier?)?;
        session.fill(slot, &value);
        Ok(value)
    }

    fn element_type(&self) -> &TypeRef {
        &self.ty
    }
}
