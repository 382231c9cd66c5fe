//! VARIANT payload decoding.
//!
//! One dispatch function decodes a tagged value into the store and reports how
//! many bytes it occupied, so vectors and arrays can walk their elements
//! without knowing the element encodings. Any read that would leave the
//! section is reported as a [`BinaryError`]; the caller decides whether that
//! costs one property or more.

use super::store::{StoreId, VariantStore};
use crate::common::binary::{
    BinaryError, BinaryResult, align4, read_f32_le, read_f64_le, read_i16_le, read_i32_le,
    read_i64_le, read_u8, read_u16_le, read_u32_le, read_u64_le, slice_at,
};
use crate::ole::codepage::{decode_bytes, decode_utf16le, terminator_width};
use crate::ole::consts::*;
use chrono::{DateTime, Utc};

/// Days between the OLE automation epoch (1899-12-30) and 1970-01-01
const OLE_TO_UNIX_EPOCH_DAYS: i64 = 25569;

/// Milliseconds per day
const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Largest OLE automation date (9999-12-31)
const OLE_DATE_MAX_DAYS: f64 = 2_958_465.0;

/// Most dimensions a VT_ARRAY header may declare
const MAX_ARRAY_DIMENSIONS: u32 = 31;

/// Largest DECIMAL scale
const DECIMAL_MAX_SCALE: u8 = 28;

/// Where a value sits: at the top of a property (padded to four bytes) or
/// inside a vector/array (fixed-width elements packed back to back).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Packing {
    Aligned,
    Packed,
}

/// Convert FILETIME ticks to UTC.
///
/// Tick counts before 1970-01-01 map to the Unix epoch itself rather than
/// underflowing. The epoch therefore doubles as the "unset" value: a stored
/// time of exactly 1970-01-01T00:00:00Z cannot be told apart from zero ticks.
///
/// # Examples
///
/// ```
/// use docfile::ole::propset::filetime_to_datetime;
/// use chrono::{DateTime, Utc};
///
/// assert_eq!(filetime_to_datetime(0), DateTime::<Utc>::UNIX_EPOCH);
/// assert_eq!(filetime_to_datetime(116_444_736_000_000_000).timestamp(), 0);
/// assert_eq!(filetime_to_datetime(116_444_736_010_000_000).timestamp(), 1);
/// ```
pub fn filetime_to_datetime(ticks: u64) -> DateTime<Utc> {
    let secs = ticks / FILETIME_TICKS_PER_SEC;
    if secs < FILETIME_UNIX_EPOCH_SECS {
        return DateTime::<Utc>::UNIX_EPOCH;
    }
    let nanos = (ticks % FILETIME_TICKS_PER_SEC) * 100;
    DateTime::from_timestamp((secs - FILETIME_UNIX_EPOCH_SECS) as i64, nanos as u32)
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Convert an OLE automation date (days since 1899-12-30, fraction = time of
/// day) to UTC, rounding to the millisecond.
///
/// For negative dates the fraction still counts forward from midnight, so
/// `-1.25` is 1899-12-29 06:00.
pub fn ole_date_to_datetime(days: f64) -> Option<DateTime<Utc>> {
    if !days.is_finite() || days.abs() > OLE_DATE_MAX_DAYS {
        return None;
    }
    let whole = days.trunc();
    let time_ms = ((days - whole).abs() * MILLIS_PER_DAY).round() as i64;
    let day = whole as i64 - OLE_TO_UNIX_EPOCH_DAYS;
    DateTime::from_timestamp_millis(day * 86_400_000 + time_ms)
}

/// Strip one trailing NUL of `width` bytes, if present.
fn trim_terminator(bytes: &[u8], width: usize) -> &[u8] {
    match bytes.len().checked_sub(width) {
        Some(end) if bytes[end..].iter().all(|&b| b == 0) => &bytes[..end],
        _ => bytes,
    }
}

/// Smallest encoded size of one vector element of type `vt`.
fn min_element_width(vt: u16) -> usize {
    match vt {
        VT_EMPTY | VT_NULL | VT_I1 | VT_UI1 => 1,
        VT_I2 | VT_UI2 | VT_BOOL => 2,
        VT_I8 | VT_UI8 | VT_R8 | VT_CY | VT_DATE | VT_FILETIME => 8,
        VT_CLSID | VT_DECIMAL => 16,
        _ => 4,
    }
}

fn stored(id: Option<StoreId>) -> BinaryResult<StoreId> {
    id.ok_or_else(|| BinaryError::ParseError("value store is full".to_string()))
}

/// Decoder over the bytes of one section.
pub(crate) struct VariantDecoder<'d, 's> {
    data: &'d [u8],
    codepage: u16,
    max_nesting: usize,
    store: &'s mut VariantStore,
}

impl<'d, 's> VariantDecoder<'d, 's> {
    pub fn new(
        data: &'d [u8],
        codepage: u16,
        max_nesting: usize,
        store: &'s mut VariantStore,
    ) -> Self {
        Self {
            data,
            codepage,
            max_nesting,
            store,
        }
    }

    /// Decode the typed value at `offset`, returning its id and encoded size.
    ///
    /// On failure nothing decoded so far for this value is left in the store.
    pub fn decode_property(&mut self, offset: usize) -> BinaryResult<(StoreId, usize)> {
        let checkpoint = self.store.checkpoint();
        let result = self.typed_value(offset, 0);
        if result.is_err() {
            self.store.rollback(checkpoint);
        }
        result
    }

    /// A 4-byte type header (tag + padding) followed by the payload
    fn typed_value(&mut self, offset: usize, depth: usize) -> BinaryResult<(StoreId, usize)> {
        let vt = read_u16_le(self.data, offset)?;
        let (id, used) = self.value(vt, offset + 4, depth, Packing::Aligned)?;
        Ok((id, 4 + used))
    }

    fn value(
        &mut self,
        vt: u16,
        offset: usize,
        depth: usize,
        packing: Packing,
    ) -> BinaryResult<(StoreId, usize)> {
        if depth > self.max_nesting {
            return Err(BinaryError::ParseError(format!(
                "VARIANT nesting deeper than {}",
                self.max_nesting
            )));
        }
        if vt & VT_VECTOR != 0 {
            return self.vector(vt & VT_TYPEMASK, offset, depth);
        }
        if vt & VT_ARRAY != 0 {
            return self.array(vt & VT_TYPEMASK, offset, depth);
        }
        self.scalar(vt, offset, depth, packing)
    }

    fn scalar(
        &mut self,
        vt: u16,
        offset: usize,
        depth: usize,
        packing: Packing,
    ) -> BinaryResult<(StoreId, usize)> {
        let data = self.data;
        let fixed = |width: usize| match packing {
            Packing::Aligned => align4(width),
            Packing::Packed => width,
        };
        let store = &mut *self.store;
        let (id, used) = match vt {
            VT_EMPTY | VT_NULL => (store.push_blob(&[]), 0),
            VT_I1 => (store.push_sig_integer(read_u8(data, offset)? as i8 as i64), fixed(1)),
            VT_UI1 => (store.push_uns_integer(read_u8(data, offset)? as u64), fixed(1)),
            VT_I2 => (store.push_sig_integer(read_i16_le(data, offset)? as i64), fixed(2)),
            VT_UI2 => (store.push_uns_integer(read_u16_le(data, offset)? as u64), fixed(2)),
            VT_BOOL => {
                let flag = read_u16_le(data, offset)? != 0;
                (store.push_uns_integer(flag as u64), fixed(2))
            },
            VT_I4 | VT_INT => (store.push_sig_integer(read_i32_le(data, offset)? as i64), 4),
            VT_UI4 | VT_UINT | VT_ERROR => {
                (store.push_uns_integer(read_u32_le(data, offset)? as u64), 4)
            },
            VT_I8 => (store.push_sig_integer(read_i64_le(data, offset)?), 8),
            VT_UI8 => (store.push_uns_integer(read_u64_le(data, offset)?), 8),
            VT_R4 => (store.push_float(read_f32_le(data, offset)? as f64), 4),
            VT_R8 => (store.push_float(read_f64_le(data, offset)?), 8),
            VT_CY => (store.push_float(read_i64_le(data, offset)? as f64 / 10_000.0), 8),
            VT_DATE => {
                let days = read_f64_le(data, offset)?;
                let when = ole_date_to_datetime(days).ok_or_else(|| {
                    BinaryError::ParseError(format!("OLE date {days} out of range"))
                })?;
                (store.push_datetime(when), 8)
            },
            VT_FILETIME => {
                let ticks = read_u64_le(data, offset)?;
                (store.push_datetime(filetime_to_datetime(ticks)), 8)
            },
            VT_DECIMAL => (store.push_float(read_decimal(data, offset)?), 16),
            VT_CLSID => (store.push_blob(slice_at(data, offset, 16)?), 16),
            VT_LPSTR | VT_BSTR => return self.code_page_string(offset, packing),
            VT_LPWSTR => return self.unicode_string(offset),
            VT_BLOB | VT_BLOB_OBJECT | VT_CF => {
                let len = read_u32_le(data, offset)? as usize;
                let bytes = slice_at(data, offset + 4, len)?;
                (store.push_blob(bytes), align4(4 + len))
            },
            VT_VARIANT => return self.typed_value(offset, depth + 1),
            other => {
                return Err(BinaryError::ParseError(format!(
                    "unsupported VARIANT type {other:#06x}"
                )));
            },
        };
        Ok((stored(id)?, used))
    }

    /// Length-prefixed string in the section codepage.
    ///
    /// Vector elements are only padded when the codepage is UTF-16.
    fn code_page_string(&mut self, offset: usize, packing: Packing) -> BinaryResult<(StoreId, usize)> {
        let len = read_u32_le(self.data, offset)? as usize;
        let bytes = slice_at(self.data, offset + 4, len)?;
        let text = decode_bytes(
            trim_terminator(bytes, terminator_width(self.codepage)),
            self.codepage,
        );
        let used = if packing == Packing::Packed && self.codepage != CP_WINUNICODE {
            4 + len
        } else {
            align4(4 + len)
        };
        Ok((stored(self.store.push_string(&text))?, used))
    }

    /// Length-prefixed UTF-16LE string; the length counts characters.
    fn unicode_string(&mut self, offset: usize) -> BinaryResult<(StoreId, usize)> {
        let chars = read_u32_le(self.data, offset)? as usize;
        let len = chars
            .checked_mul(2)
            .ok_or_else(|| BinaryError::ParseError("string length overflow".to_string()))?;
        let bytes = slice_at(self.data, offset + 4, len)?;
        let text = decode_utf16le(trim_terminator(bytes, 2));
        Ok((stored(self.store.push_string(&text))?, align4(4 + len)))
    }

    fn vector(&mut self, vt: u16, offset: usize, depth: usize) -> BinaryResult<(StoreId, usize)> {
        let count = read_u32_le(self.data, offset)? as usize;
        let (ids, used) = self.elements(vt, offset + 4, count, depth)?;
        Ok((stored(self.store.push_array(&ids))?, align4(4 + used)))
    }

    /// Multi-dimensional SAFEARRAY, flattened in storage order.
    fn array(&mut self, vt: u16, offset: usize, depth: usize) -> BinaryResult<(StoreId, usize)> {
        let dimensions = read_u32_le(self.data, offset + 4)?;
        if dimensions == 0 || dimensions > MAX_ARRAY_DIMENSIONS {
            return Err(BinaryError::ParseError(format!(
                "array declares {dimensions} dimensions"
            )));
        }
        let mut count = 1usize;
        for dim in 0..dimensions as usize {
            let size = read_u32_le(self.data, offset + 8 + dim * 8)? as usize;
            count = count
                .checked_mul(size)
                .ok_or_else(|| BinaryError::ParseError("array size overflow".to_string()))?;
        }
        let header = 8 + dimensions as usize * 8;
        let (ids, used) = self.elements(vt, offset + header, count, depth)?;
        Ok((stored(self.store.push_array(&ids))?, align4(header + used)))
    }

    fn elements(
        &mut self,
        vt: u16,
        offset: usize,
        count: usize,
        depth: usize,
    ) -> BinaryResult<(Vec<StoreId>, usize)> {
        let available = self.data.len().saturating_sub(offset);
        let needed = count.saturating_mul(min_element_width(vt));
        if needed > available {
            return Err(BinaryError::InsufficientData {
                expected: offset.saturating_add(needed),
                available: self.data.len(),
            });
        }
        let mut ids = Vec::with_capacity(count);
        let mut pos = offset;
        for _ in 0..count {
            let (id, used) = if vt == VT_VARIANT {
                self.typed_value(pos, depth + 1)?
            } else {
                self.value(vt, pos, depth + 1, Packing::Packed)?
            };
            ids.push(id);
            pos += used;
        }
        Ok((ids, pos - offset))
    }
}

/// 96-bit scaled integer: reserved(2) scale(1) sign(1) hi32(4) lo64(8)
fn read_decimal(data: &[u8], offset: usize) -> BinaryResult<f64> {
    let scale = read_u8(data, offset + 2)?;
    let sign = read_u8(data, offset + 3)?;
    let hi = read_u32_le(data, offset + 4)? as u128;
    let lo = read_u64_le(data, offset + 8)? as u128;
    if scale > DECIMAL_MAX_SCALE {
        return Err(BinaryError::ParseError(format!("DECIMAL scale {scale}")));
    }
    let magnitude = ((hi << 64) | lo) as f64 / 10f64.powi(scale as i32);
    Ok(if sign & 0x80 != 0 { -magnitude } else { magnitude })
}
