use std::io;
use std::sync::Arc;

use super::manifest::{read_names, write_type_manifest};
use super::{ValueSerializer, snapshot};
use crate::error::{Error, Result};
use crate::serializer::Serializer;
use crate::session::{DeserializerSession, SerializerSession};
use crate::stream::{ReadExt as _, WriteExt as _};
use crate::types::{MethodInfo, TypeRef};
use crate::value::{Member, Object, ObjectData, Value};

const KIND_FIELD: u8 = 0;
const KIND_METHOD: u8 = 1;

/// Serializer for reflection member handles.
///
/// A handle is written as its declaring type and signature, never by value,
/// and resolved against the type registry when read.
#[derive(Debug)]
pub struct MemberSerializer {
    ty: TypeRef,
}

impl MemberSerializer {
    pub fn new(ty: &TypeRef) -> Self {
        Self { ty: Arc::clone(ty) }
    }
}

impl ValueSerializer for MemberSerializer {
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
        _session: &mut SerializerSession<'_>,
    ) -> Result<()> {
        let member = snapshot(value, self.ty.name(), |data| match data {
            ObjectData::Member(m) => Some(m.clone()),
            _ => None,
        })?;

        match member {
            Member::Field { declaring, name } => {
                writer.write_u8(KIND_FIELD)?;
                writer.write_length_prefixed(declaring.name().as_bytes())?;
                writer.write_length_prefixed(name.as_bytes())
            },
            Member::Method(method) => {
                writer.write_u8(KIND_METHOD)?;
                write_method(writer, &method)
            },
        }
    }

    fn read_value(
        &self,
        reader: &mut dyn io::Read,
        session: &mut DeserializerSession<'_>,
    ) -> Result<Value> {
        let member = match reader.read_u8()? {
            KIND_FIELD => {
                let declaring = reader.read_name()?;
                let name = reader.read_name()?;
                let declaring = session.serializer().types().resolve(&declaring)?;
                let known = declaring
                    .as_struct()
                    .is_some_and(|s| s.field_slot(&name).is_some());
                if !known {
                    return Err(unknown_member(&declaring, name));
                }

                Member::Field {
                    declaring,
                    name: name.into(),
                }
            },
            KIND_METHOD => Member::Method(read_method(reader, session.serializer())?),
            kind => return Err(Error::mismatch("member kind", format!("{kind}"))),
        };

        // no nested value registers, so registering last keeps the ids aligned
        let value = Value::object(Object::with_data(&self.ty, ObjectData::Member(member)));
        session.register(&value);
        Ok(value)
    }

    fn element_type(&self) -> &TypeRef {
        &self.ty
    }
}

fn unknown_member(ty: &TypeRef, member: String) -> Error {
    Error::UnknownMember {
        type_name: ty.name().to_owned(),
        member,
    }
}

/// Writes a method as declaring type, name, and parameter type names.
pub(super) fn write_method(writer: &mut dyn io::Write, method: &MethodInfo) -> Result<()> {
    writer.write_length_prefixed(method.declaring().as_bytes())?;
    writer.write_length_prefixed(method.name().as_bytes())?;
    writer.write_varint(method.params().len())?;
    for param in method.params() {
        writer.write_length_prefixed(param.as_bytes())?;
    }

    Ok(())
}

/// Reads a method written by [`write_method`] and resolves it.
pub(super) fn read_method(
    reader: &mut dyn io::Read,
    serializer: &Serializer,
) -> Result<Arc<MethodInfo>> {
    let declaring = reader.read_name()?;
    let name = reader.read_name()?;
    let params = read_names(reader)?;

    let declaring = serializer.types().resolve(&declaring)?;
    declaring
        .as_struct()
        .and_then(|s| s.method(&name, &params))
        .cloned()
        .ok_or_else(|| unknown_member(&declaring, format!("{name}({})", params.join(", "))))
}
