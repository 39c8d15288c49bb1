//! Manifest bytes and type manifests.
//!
//! Bytes `1..=250` directly select a serializer from the primitive table.
//! The remaining bytes introduce structured manifests:
//!
//! | Byte | Layout                                        |
//! |------|-----------------------------------------------|
//! | 0    | null, no body follows                         |
//! | 251  | consistent array: element manifest byte       |
//! | 252  | object reference: `uint` id, no body follows  |
//! | 253  | full manifest: type name                      |
//! | 254  | version manifest: type name, field names      |
//! | 255  | indexed manifest: `u16` little endian index   |

use std::io;

use crate::error::Result;
use crate::session::SerializerSession;
use crate::stream::{ReadExt as _, WriteExt as _};
use crate::types::TypeRef;

pub const NULL: u8 = 0;
pub const CONSISTENT_ARRAY: u8 = 251;
pub const OBJECT_REF: u8 = 252;
pub const FULL: u8 = 253;
pub const VERSION: u8 = 254;
pub const INDEXED: u8 = 255;

/// Writes a full manifest on the first occurrence of `ty` in a session and
/// an indexed manifest afterwards. Known types are always indexed.
///
/// Custom [`ValueSerializer`](super::ValueSerializer) implementations
/// should use this for their manifest.
///
/// # Errors
///
/// Returns `Err` if writing failed or the session ran out of type indices.
pub fn write_type_manifest(
    writer: &mut dyn io::Write,
    ty: &TypeRef,
    session: &mut SerializerSession<'_>,
) -> Result<()> {
    if write_indexed(writer, ty, session)? {
        return Ok(());
    }

    writer.write_u8(FULL)?;
    writer.write_length_prefixed(ty.name().as_bytes())?;
    session.discover(ty.name())
}

/// Like [`write_type_manifest`], but the first occurrence announces the
/// field names the body is written with.
pub(crate) fn write_version_manifest<'a, I>(
    writer: &mut dyn io::Write,
    ty: &TypeRef,
    fields: I,
    session: &mut SerializerSession<'_>,
) -> Result<()>
where
    I: ExactSizeIterator<Item = &'a str>,
{
    if write_indexed(writer, ty, session)? {
        return Ok(());
    }

    writer.write_u8(VERSION)?;
    writer.write_length_prefixed(ty.name().as_bytes())?;
    writer.write_varint(fields.len())?;
    for name in fields {
        writer.write_length_prefixed(name.as_bytes())?;
    }

    session.discover(ty.name())
}

fn write_indexed(
    writer: &mut dyn io::Write,
    ty: &TypeRef,
    session: &SerializerSession<'_>,
) -> Result<bool> {
    let Some(index) = session.type_index(ty.name()) else {
        return Ok(false);
    };

    writer.write_u8(INDEXED)?;
    writer.write_all(&index.to_le_bytes())?;
    Ok(true)
}

/// Reads a length-prefixed list of names, such as the fields of a version
/// manifest.
pub(crate) fn read_names(reader: &mut dyn io::Read) -> Result<Vec<String>> {
    let len = reader.read_len()?;
    let mut fields = Vec::with_capacity(len.min(0x100));
    for _ in 0..len {
        fields.push(reader.read_name()?);
    }

    Ok(fields)
}
