//! Generic LEB128 variable-length encoding/decoding.
//!
//! This is used as the serialized format for integers wider than a byte,
//! lengths, and object reference ids. Signed integers are encoded as the
//! unsigned LEB128 of their two's complement bit pattern, so small positive
//! values stay short while negative values take the full width.
//!
//! See also: <https://en.wikipedia.org/wiki/LEB128>

use std::io;
use std::ops::{BitOr, BitOrAssign, Shl, Shr, ShrAssign};

use crate::error::Error;
use crate::stream::ReadExt as _;

/// Supports the en-/decoding functions.
///
/// Implemented for unsigned integers.
trait Uleb128Encode:
    Sized
    + Default
    + Copy
    + PartialOrd
    + Shr<usize, Output = Self>
    + Shl<usize, Output = Self>
    + ShrAssign<usize>
    + BitOr<Output = Self>
    + BitOrAssign
    + From<u8>
{
    type Buf: AsMut<[u8]> + Default;

    fn trunc_u8(self) -> u8;
}

/// Declares a type as supporting being encoded in LEB128.
///
/// This type essentially specifies a conversion to/from an unsigned type that
/// implements [`Uleb128Encode`]. For unsigned integers, that is a no-op.
pub trait Leb128: Sized + Copy {
    #[allow(private_bounds)]
    type Unsigned: Uleb128Encode;

    fn into_unsigned(self) -> Self::Unsigned;
    fn from_unsigned(value: Self::Unsigned) -> Self;
}

impl<T: Uleb128Encode> Leb128 for T {
    type Unsigned = Self;

    fn into_unsigned(self) -> Self::Unsigned {
        self
    }

    fn from_unsigned(value: Self::Unsigned) -> Self {
        value
    }
}

const fn buf_size<T>() -> usize {
    bitness::<T>().div_ceil(7)
}

const fn bitness<T>() -> usize {
    size_of::<T>() * 8
}

/// Writes `x` as LEB128.
///
/// # Errors
///
/// Returns `Err` if writing to `writer` failed.
pub fn write<T, W>(writer: W, x: T) -> Result<(), Error>
where
    T: Leb128,
    W: io::Write,
{
    write_inner(writer, x.into_unsigned())
}

fn write_inner<T, W>(mut writer: W, mut x: T) -> Result<(), Error>
where
    T: Uleb128Encode,
    W: io::Write,
{
    let mut buf = T::Buf::default();
    let buf = buf.as_mut();
    let mut i = 0usize;
    while x >= T::from(0x80) {
        buf[i] = x.trunc_u8() | 0x80;
        x >>= 7;
        i += 1;
    }

    buf[i] = x.trunc_u8();
    i += 1;

    Ok(writer.write_all(&buf[..i])?)
}

/// Reads a LEB128 value.
///
/// # Errors
///
/// Returns `Err` if reading failed or the value overflows `T`.
pub fn read<T, R>(reader: R) -> Result<T, Error>
where
    T: Leb128,
    R: io::Read,
{
    read_inner(reader).map(T::from_unsigned)
}

fn read_inner<T, R>(mut reader: R) -> Result<T, Error>
where
    T: Uleb128Encode,
    R: io::Read,
{
    let mut x = T::default();
    let mut s = 0usize;
    loop {
        let [b] = reader.read_bytes()?;
        // ensure the shift isn't greater than the bit-count of `T`
        if s >= bitness::<T>() {
            return Err(Error::IntegerOverflow);
        }

        // convert to shifted `T`
        // ensure that all bits fit into `T`
        let tb = T::from(b & 0x7F);
        let ts = tb << s;
        if ts >> s != tb {
            return Err(Error::IntegerOverflow);
        }

        x |= ts;
        s += 7;

        if b < 0x80 {
            // No continuation bit is set
            return Ok(x);
        }
    }
}

macro_rules! impl_uleb {
    ($($Ty:ty)*) => { $(
        impl Uleb128Encode for $Ty {
            type Buf = [u8; buf_size::<Self>()];

            #[allow(clippy::cast_possible_truncation)]
            fn trunc_u8(self) -> u8 {
                self as u8
            }
        }
    )* };
}

macro_rules! impl_uleb_signed {
    ($($Ty:ty as $Unsigned:ty),* $(,)?) => { $(
        impl Leb128 for $Ty {
            type Unsigned = $Unsigned;

            #[allow(clippy::cast_sign_loss)]
            fn into_unsigned(self) -> Self::Unsigned {
                self as $Unsigned
            }

            #[allow(clippy::cast_possible_wrap)]
            fn from_unsigned(value: Self::Unsigned) -> Self {
                value as $Ty
            }
        }
    )* };
}

impl_uleb!(u16 u32 u64 u128 usize);
impl_uleb_signed!(
    i16 as u16,
    i32 as u32,
    i64 as u64,
    i128 as u128,
    isize as usize,
);

#[cfg(test)]
mod tests {
    use super::*;

    fn encode<T: Leb128>(x: T) -> Vec<u8> {
        let mut buf = Vec::new();
        write(&mut buf, x).expect("encoding worked");
        buf
    }

    #[test]
    fn widths_match_the_wire() {
        let cases: &[(i64, usize)] = &[
            (0, 1),
            (127, 1),
            (128, 2),
            (300, 2),
            (i64::from(i32::MAX), 5),
            (-1, 10),
            (i64::MIN, 10),
        ];

        for &(value, len) in cases {
            let buf = encode(value);
            assert_eq!(buf.len(), len, "encoded width of {value}");
            let back: i64 = read(buf.as_slice()).expect("decoding worked");
            assert_eq!(back, value, "{value} must survive");
        }
    }

    #[test]
    fn signed_and_unsigned_share_bits() {
        assert_eq!(encode(-2i16), encode(u16::MAX - 1), "same bit pattern");
        assert_eq!(encode(i32::MIN), encode(1u32 << 31), "same bit pattern");

        let back: i128 = read(encode(i128::MIN).as_slice()).expect("decoding worked");
        assert_eq!(back, i128::MIN, "widest type must survive");
    }

    #[test]
    fn ids_as_usize() {
        for id in [0usize, 1, 5000, usize::MAX] {
            let back: usize = read(encode(id).as_slice()).expect("decoding worked");
            assert_eq!(back, id, "id {id} must survive");
        }
    }

    #[test]
    fn small_positive_is_one_byte() {
        let mut buf = Vec::new();
        write(&mut buf, 123i32).expect("encoding worked");
        assert_eq!(buf, [123], "small values fit a single byte");
    }

    #[test]
    fn negative_takes_full_width() {
        let mut buf = Vec::new();
        write(&mut buf, -1i32).expect("encoding worked");
        assert_eq!(buf, [0xFF, 0xFF, 0xFF, 0xFF, 0x0F], "bit pattern of u32::MAX");
    }

    #[test]
    fn overflow_is_rejected() {
        let buf = [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01];
        let res = read::<u32, _>(buf.as_slice());
        assert!(
            matches!(res, Err(Error::IntegerOverflow)),
            "must overflow: {res:?}"
        );
    }
}
