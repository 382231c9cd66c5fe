//! Bounds-checked little-endian readers over byte slices.
//!
//! Every property-set field is read through these helpers so that a corrupt
//! length or offset surfaces as a [`BinaryError`] instead of a slice panic.

use thiserror::Error;
use zerocopy::{F32, F64, FromBytes, I16, I32, I64, LE, U16, U32, U64};

/// Binary parsing error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BinaryError {
    /// Not enough data to read the requested type
    #[error("Insufficient data: expected {expected}, got {available}")]
    InsufficientData { expected: usize, available: usize },
    /// Failed to parse the data
    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Result type for binary operations
pub type BinaryResult<T> = Result<T, BinaryError>;

/// Borrow `len` bytes starting at `offset`, failing instead of panicking when
/// the range leaves `data` (including on arithmetic overflow).
///
/// # Examples
///
/// ```
/// use docfile::common::binary::slice_at;
/// let data = [1u8, 2, 3, 4];
/// assert_eq!(slice_at(&data, 1, 2).unwrap(), &[2, 3]);
/// assert!(slice_at(&data, 3, 2).is_err());
/// ```
#[inline]
pub fn slice_at(data: &[u8], offset: usize, len: usize) -> BinaryResult<&[u8]> {
    let end = offset
        .checked_add(len)
        .ok_or_else(|| BinaryError::ParseError("Offset overflow".to_string()))?;
    data.get(offset..end).ok_or(BinaryError::InsufficientData {
        expected: end,
        available: data.len(),
    })
}

macro_rules! le_reader {
    ($(#[$doc:meta])* $name:ident, $ty:ty, $wire:ty, $size:expr) => {
        $(#[$doc])*
        #[inline]
        pub fn $name(data: &[u8], offset: usize) -> BinaryResult<$ty> {
            let bytes = slice_at(data, offset, $size)?;
            <$wire>::read_from_bytes(bytes)
                .map(|v| v.get())
                .map_err(|_| {
                    BinaryError::ParseError(concat!("Failed to read ", stringify!($ty)).to_string())
                })
        }
    };
}

le_reader!(
    /// Read a little-endian u16 from a byte slice at the given offset.
    ///
    /// # Examples
    ///
    /// ```
    /// use docfile::common::binary::read_u16_le;
    /// let data = [0x34, 0x12, 0x78, 0x56];
    /// assert_eq!(read_u16_le(&data, 0).unwrap(), 0x1234);
    /// assert_eq!(read_u16_le(&data, 2).unwrap(), 0x5678);
    /// ```
    read_u16_le, u16, U16<LE>, 2
);
le_reader!(
    /// Read a little-endian i16 from a byte slice at the given offset.
    read_i16_le, i16, I16<LE>, 2
);
le_reader!(
    /// Read a little-endian u32 from a byte slice at the given offset.
    ///
    /// # Examples
    ///
    /// ```
    /// use docfile::common::binary::read_u32_le;
    /// let data = [0x78, 0x56, 0x34, 0x12];
    /// assert_eq!(read_u32_le(&data, 0).unwrap(), 0x12345678);
    /// ```
    read_u32_le, u32, U32<LE>, 4
);
le_reader!(
    /// Read a little-endian i32 from a byte slice at the given offset.
    read_i32_le, i32, I32<LE>, 4
);
le_reader!(
    /// Read a little-endian u64 from a byte slice at the given offset.
    read_u64_le, u64, U64<LE>, 8
);
le_reader!(
    /// Read a little-endian i64 from a byte slice at the given offset.
    read_i64_le, i64, I64<LE>, 8
);
le_reader!(
    /// Read a little-endian f32 from a byte slice at the given offset.
    read_f32_le, f32, F32<LE>, 4
);
le_reader!(
    /// Read a little-endian f64 from a byte slice at the given offset.
    ///
    /// # Examples
    ///
    /// ```
    /// use docfile::common::binary::read_f64_le;
    /// let data = [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xF0, 0x3F];
    /// assert!((read_f64_le(&data, 0).unwrap() - 1.0).abs() < f64::EPSILON);
    /// ```
    read_f64_le, f64, F64<LE>, 8
);

/// Read a single byte at the given offset.
#[inline]
pub fn read_u8(data: &[u8], offset: usize) -> BinaryResult<u8> {
    data.get(offset).copied().ok_or(BinaryError::InsufficientData {
        expected: offset.saturating_add(1),
        available: data.len(),
    })
}

/// Read a 16-byte GUID as stored on disk.
#[inline]
pub fn read_guid(data: &[u8], offset: usize) -> BinaryResult<[u8; 16]> {
    let bytes = slice_at(data, offset, 16)?;
    let mut guid = [0u8; 16];
    guid.copy_from_slice(bytes);
    Ok(guid)
}

/// Round `len` up to the next multiple of four.
#[inline]
pub const fn align4(len: usize) -> usize {
    (len + 3) & !3
}
