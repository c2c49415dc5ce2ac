//! Bounds-checked little-endian reading and writing of primitive values.
//!
//! Every structure in a CLI image (PE headers, the CLI header, metadata tables, method bodies)
//! is little-endian. The helpers in this module read and write primitives at an offset into a
//! byte slice, advancing the offset, and fail with [`crate::Error::OutOfBounds`] instead of
//! panicking when the slice is too short. The `_dyn` variants handle the 2-or-4 byte heap and
//! table indexes of the metadata tables stream.
//!
//! # Examples
//!
//! ```rust,ignore
//! use crate::file::io::{read_le_at, write_le_at};
//!
//! let mut data = [0u8; 6];
//! let mut offset = 0;
//! write_le_at(&mut data, &mut offset, 0x1234_u16)?;
//! write_le_at(&mut data, &mut offset, 0xDEAD_BEEF_u32)?;
//!
//! let mut offset = 2;
//! assert_eq!(read_le_at::<u32>(&data, &mut offset)?, 0xDEAD_BEEF);
//! ```

use crate::{Error::OutOfBounds, Result};

/// Primitive types that can be read from and written to little-endian byte buffers.
pub trait CilIO: Sized + Copy {
    /// Fixed-size byte representation of this type
    type Bytes: Sized + AsRef<[u8]> + for<'a> TryFrom<&'a [u8]>;

    /// Decode from little-endian bytes
    fn from_le_bytes(bytes: Self::Bytes) -> Self;

    /// Encode into little-endian bytes
    fn to_le_bytes(self) -> Self::Bytes;
}

macro_rules! impl_cil_io {
    ($($ty:ty),*) => {
        $(
            impl CilIO for $ty {
                type Bytes = [u8; std::mem::size_of::<$ty>()];

                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_le_bytes(bytes)
                }

                fn to_le_bytes(self) -> Self::Bytes {
                    <$ty>::to_le_bytes(self)
                }
            }
        )*
    };
}

impl_cil_io!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

/// Reads a value of type `T` from the start of `data`.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if `data` is shorter than `T`.
pub fn read_le<T: CilIO>(data: &[u8]) -> Result<T> {
    let mut offset = 0_usize;
    read_le_at(data, &mut offset)
}

/// Reads a value of type `T` at `offset` and advances `offset` past it.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the value does not fit.
pub fn read_le_at<T: CilIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let type_len = std::mem::size_of::<T>();
    let Some(end) = offset.checked_add(type_len) else {
        return Err(OutOfBounds);
    };
    if end > data.len() {
        return Err(OutOfBounds);
    }

    let Ok(read) = data[*offset..end].try_into() else {
        return Err(OutOfBounds);
    };

    *offset = end;

    Ok(T::from_le_bytes(read))
}

/// Reads a 4-byte index if `is_large`, otherwise a 2-byte index widened to `u32`.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the index does not fit.
pub fn read_le_at_dyn(data: &[u8], offset: &mut usize, is_large: bool) -> Result<u32> {
    let res = if is_large {
        read_le_at::<u32>(data, offset)?
    } else {
        u32::from(read_le_at::<u16>(data, offset)?)
    };

    Ok(res)
}

/// Writes `value` at the start of `data`.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if `data` is shorter than `T`.
pub fn write_le<T: CilIO>(data: &mut [u8], value: T) -> Result<()> {
    let mut offset = 0_usize;
    write_le_at(data, &mut offset, value)
}

/// Writes `value` at `offset` and advances `offset` past it.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the value does not fit.
pub fn write_le_at<T: CilIO>(data: &mut [u8], offset: &mut usize, value: T) -> Result<()> {
    let bytes = value.to_le_bytes();
    let bytes = bytes.as_ref();
    let Some(end) = offset.checked_add(bytes.len()) else {
        return Err(OutOfBounds);
    };
    if end > data.len() {
        return Err(OutOfBounds);
    }

    data[*offset..end].copy_from_slice(bytes);
    *offset = end;

    Ok(())
}

/// Writes a 4-byte index if `is_large`, otherwise a 2-byte index.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the index does not fit in the buffer, or a
/// malformed error if a small index is asked to hold a value above `u16::MAX`.
pub fn write_le_at_dyn(
    data: &mut [u8],
    offset: &mut usize,
    value: u32,
    is_large: bool,
) -> Result<()> {
    if is_large {
        write_le_at::<u32>(data, offset, value)?;
    } else {
        let Ok(small) = u16::try_from(value) else {
            return Err(malformed_error!(
                "Index {} does not fit into a 2-byte column",
                value
            ));
        };
        write_le_at::<u16>(data, offset, small)?;
    }

    Ok(())
}

/// Appends `value` to a growable buffer.
pub fn push_le<T: CilIO>(buffer: &mut Vec<u8>, value: T) {
    buffer.extend_from_slice(value.to_le_bytes().as_ref());
}

/// Appends a 2 or 4 byte index to a growable buffer.
///
/// # Errors
/// Fails if a small index is asked to hold a value above `u16::MAX`.
pub fn push_le_dyn(buffer: &mut Vec<u8>, value: u32, is_large: bool) -> Result<()> {
    if is_large {
        push_le(buffer, value);
    } else {
        let Ok(small) = u16::try_from(value) else {
            return Err(malformed_error!(
                "Index {} does not fit into a 2-byte column",
                value
            ));
        };
        push_le(buffer, small);
    }

    Ok(())
}

/// Appends an ECMA-335 compressed unsigned integer (II.23.2).
///
/// # Errors
/// Fails for values above `0x1FFF_FFFF`, which the encoding cannot represent.
pub fn push_compressed_uint(buffer: &mut Vec<u8>, value: u32) -> Result<()> {
    match value {
        0..=0x7F => buffer.push(value as u8),
        0x80..=0x3FFF => {
            buffer.push(((value >> 8) as u8) | 0x80);
            buffer.push(value as u8);
        }
        0x4000..=0x1FFF_FFFF => {
            buffer.extend_from_slice(&(value | 0xC000_0000).to_be_bytes());
        }
        _ => {
            return Err(malformed_error!(
                "Value {} is too large for a compressed integer",
                value
            ))
        }
    }

    Ok(())
}

/// Pads a growable buffer with zeros up to the next multiple of `alignment`.
pub fn pad_to(buffer: &mut Vec<u8>, alignment: usize) {
    let len = buffer.len();
    buffer.resize(align_up(len, alignment), 0);
}

/// Rounds `value` up to the next multiple of `alignment` (which must be non-zero).
#[must_use]
pub fn align_up(value: usize, alignment: usize) -> usize {
    value.div_ceil(alignment) * alignment
}
