use std::io;
use std::sync::Arc;

use time::{OffsetDateTime, UtcOffset};
use uuid::Uuid;

use super::ValueSerializer;
use crate::error::{Error, Result};
use crate::session::{DeserializerSession, SerializerSession};
use crate::stream::{ReadExt as _, WriteExt as _};
use crate::types::{Primitive, TypeRef};
use crate::value::Value;

/// Serializer for a built-in scalar with a fixed manifest byte.
#[derive(Debug)]
pub struct PrimitiveSerializer {
    primitive: Primitive,
    ty: TypeRef,
}

impl PrimitiveSerializer {
    pub fn new(ty: &TypeRef) -> Option<Self> {
        Some(Self {
            primitive: ty.primitive()?,
            ty: Arc::clone(ty),
        })
    }
}

impl ValueSerializer for PrimitiveSerializer {
    fn write_manifest(
        &self,
        writer: &mut dyn io::Write,
        _session: &mut SerializerSession<'_>,
    ) -> Result<()> {
        writer.write_u8(self.primitive.manifest())
    }

    fn write_value(
        &self,
        writer: &mut dyn io::Write,
        value: &Value,
        _session: &mut SerializerSession<'_>,
    ) -> Result<()> {
        write_body(writer, self.primitive, value)
    }

    fn read_value(
        &self,
        reader: &mut dyn io::Read,
        session: &mut DeserializerSession<'_>,
    ) -> Result<Value> {
        let value = match self.primitive {
            Primitive::String => Value::String(session.read_str(reader)?),
            Primitive::Bytes => Value::Bytes(session.read_blob(reader)?),
            Primitive::Type => {
                let name = reader.read_name()?;
                return Ok(Value::Type(session.serializer().types().resolve(&name)?));
            },
            p => return read_body(reader, p),
        };

        // strings and byte arrays have identity
        session.register(&value);
        Ok(value)
    }

    fn element_type(&self) -> &TypeRef {
        &self.ty
    }
}

/// Writes the body of a primitive value.
///
/// This is also used directly for fields and consistent array elements
/// whose declared type is a value type.
pub(crate) fn write_body(writer: &mut dyn io::Write, p: Primitive, value: &Value) -> Result<()> {
    match (p, value) {
        (Primitive::Bool, Value::Bool(v)) => writer.write_u8(u8::from(*v)),
        (Primitive::U8, Value::U8(v)) => writer.write_u8(*v),
        (Primitive::I8, Value::I8(v)) => Ok(writer.write_all(&v.to_le_bytes())?),
        (Primitive::I16, Value::I16(v)) => writer.write_varint(*v),
        (Primitive::U16, Value::U16(v)) => writer.write_varint(*v),
        (Primitive::I32, Value::I32(v)) => writer.write_varint(*v),
        (Primitive::U32, Value::U32(v)) => writer.write_varint(*v),
        (Primitive::I64, Value::I64(v)) => writer.write_varint(*v),
        (Primitive::U64, Value::U64(v)) => writer.write_varint(*v),
        (Primitive::I128, Value::I128(v)) => writer.write_varint(*v),
        (Primitive::U128, Value::U128(v)) => writer.write_varint(*v),
        (Primitive::F32, Value::F32(v)) => Ok(writer.write_all(&v.to_le_bytes())?),
        (Primitive::F64, Value::F64(v)) => Ok(writer.write_all(&v.to_le_bytes())?),
        (Primitive::Char, Value::Char(v)) => writer.write_varint(u32::from(*v)),
        (Primitive::String, Value::String(v)) => writer.write_length_prefixed(v.as_bytes()),
        (Primitive::Bytes, Value::Bytes(v)) => writer.write_length_prefixed(v),
        (Primitive::DateTime, Value::DateTime(v)) => {
            writer.write_all(&v.unix_timestamp().to_le_bytes())?;
            writer.write_all(&v.nanosecond().to_le_bytes())?;
            Ok(writer.write_all(&v.offset().whole_seconds().to_le_bytes())?)
        },
        (Primitive::Duration, Value::Duration(v)) => {
            writer.write_all(&v.whole_seconds().to_le_bytes())?;
            Ok(writer.write_all(&v.subsec_nanoseconds().to_le_bytes())?)
        },
        (Primitive::Guid, Value::Guid(v)) => Ok(writer.write_all(v.as_bytes())?),
        (Primitive::Type, Value::Type(v)) => writer.write_length_prefixed(v.name().as_bytes()),
        _ => Err(Error::mismatch(p.name(), value.type_name())),
    }
}

/// Reads the body of a value type primitive.
pub(crate) fn read_body(reader: &mut dyn io::Read, p: Primitive) -> Result<Value> {
    Ok(match p {
        Primitive::Bool => match reader.read_u8()? {
            0 => Value::Bool(false),
            1 => Value::Bool(true),
            _ => return Err(Error::InvalidBool),
        },
        Primitive::U8 => Value::U8(reader.read_u8()?),
        Primitive::I8 => Value::I8(i8::from_le_bytes(reader.read_bytes()?)),
        Primitive::I16 => Value::I16(reader.read_varint()?),
        Primitive::U16 => Value::U16(reader.read_varint()?),
        Primitive::I32 => Value::I32(reader.read_varint()?),
        Primitive::U32 => Value::U32(reader.read_varint()?),
        Primitive::I64 => Value::I64(reader.read_varint()?),
        Primitive::U64 => Value::U64(reader.read_varint()?),
        Primitive::I128 => Value::I128(reader.read_varint()?),
        Primitive::U128 => Value::U128(reader.read_varint()?),
        Primitive::F32 => Value::F32(f32::from_le_bytes(reader.read_bytes()?)),
        Primitive::F64 => Value::F64(f64::from_le_bytes(reader.read_bytes()?)),
        Primitive::Char => {
            let code: u32 = reader.read_varint()?;
            Value::Char(char::from_u32(code).ok_or(Error::InvalidChar)?)
        },
        Primitive::DateTime => Value::DateTime(read_datetime(reader)?),
        Primitive::Duration => {
            let secs = i64::from_le_bytes(reader.read_bytes()?);
            let nanos = i32::from_le_bytes(reader.read_bytes()?);
            if nanos.unsigned_abs() >= 1_000_000_000 {
                return Err(Error::InvalidDateTime);
            }

            Value::Duration(time::Duration::new(secs, nanos))
        },
        Primitive::Guid => Value::Guid(Uuid::from_bytes(reader.read_bytes()?)),
        Primitive::String | Primitive::Bytes | Primitive::Type => {
            return Err(Error::mismatch("value type", p.name()));
        },
    })
}

fn read_datetime(reader: &mut dyn io::Read) -> Result<OffsetDateTime> {
    let secs = i64::from_le_bytes(reader.read_bytes()?);
    let nanos = u32::from_le_bytes(reader.read_bytes()?);
    let offset = i32::from_le_bytes(reader.read_bytes()?);

    let offset = UtcOffset::from_whole_seconds(offset).map_err(|_| Error::InvalidDateTime)?;
    OffsetDateTime::from_unix_timestamp(secs)
        .and_then(|dt| dt.replace_nanosecond(nanos))
        .ok()
        .and_then(|dt| dt.checked_to_offset(offset))
        .ok_or(Error::InvalidDateTime)
}
