//! Byte-stream helpers shared by all value serializers.
//!
//! The engine only talks to [`io::Write`] and [`io::Read`]. These extension
//! traits add the handful of primitives the wire format is built from: fixed
//! size chunks, LEB128 integers, and length-prefixed payloads.

use std::io;

use crate::error::{Error, Result};
use crate::leb128::{self, Leb128};

/// Payloads up to this size are read through the session scratch buffer.
/// Larger payloads are read into a dedicated allocation that grows with the
/// data actually present, so a corrupt length prefix cannot force a huge
/// allocation up front.
pub(crate) const SCRATCH_LIMIT: usize = 0x10000;

/// Returns an [`io::Error`] with kind [`io::ErrorKind::UnexpectedEof`].
pub(crate) fn eof() -> Error {
    io::Error::from(io::ErrorKind::UnexpectedEof).into()
}

/// Reading helpers for any [`io::Read`], including `dyn io::Read`.
pub trait ReadExt: io::Read {
    /// Reads a constant size chunk of bytes.
    fn read_bytes<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Reads a single byte.
    fn read_u8(&mut self) -> Result<u8> {
        let [b] = self.read_bytes()?;
        Ok(b)
    }

    /// Reads a LEB128 encoded integer.
    fn read_varint<T: Leb128>(&mut self) -> Result<T> {
        leb128::read(self)
    }

    /// Reads a LEB128 length prefix.
    fn read_len(&mut self) -> Result<usize> {
        self.read_varint()
    }

    /// Reads a chunk of bytes, returning it as a newly allocated [`Vec`].
    #[inline(never)]
    fn read_byte_vec(&mut self, len: usize) -> Result<Vec<u8>> {
        use std::io::Read as _;

        // don't allocate too much or incorrect data could lead to a DoS
        let capacity = len.min(0x1000);
        let mut buf = Vec::with_capacity(capacity);
        let limit = u64::try_from(len).map_err(|_| eof())?;
        io::Read::take(&mut *self, limit).read_to_end(&mut buf)?;

        if buf.len() == len {
            Ok(buf)
        } else {
            Err(eof())
        }
    }

    /// Reads a length-prefixed UTF-8 string as an owned [`String`].
    ///
    /// Used for type and member names, which are not part of the tracked
    /// object graph.
    fn read_name(&mut self) -> Result<String> {
        let len = self.read_len()?;
        let bytes = self.read_byte_vec(len)?;
        String::from_utf8(bytes).map_err(|_| Error::InvalidUtf8)
    }
}

impl<R: io::Read + ?Sized> ReadExt for R {}

/// Writing helpers for any [`io::Write`], including `dyn io::Write`.
pub trait WriteExt: io::Write {
    /// Writes a single byte.
    fn write_u8(&mut self, v: u8) -> Result<()> {
        Ok(self.write_all(&[v])?)
    }

    /// Writes a LEB128 encoded integer.
    fn write_varint<T: Leb128>(&mut self, v: T) -> Result<()> {
        leb128::write(self, v)
    }

    /// Writes a `[varint length][raw bytes]` payload.
    fn write_length_prefixed(&mut self, v: &[u8]) -> Result<()> {
        self.write_varint(v.len())?;
        Ok(self.write_all(v)?)
    }
}

impl<W: io::Write + ?Sized> WriteExt for W {}
