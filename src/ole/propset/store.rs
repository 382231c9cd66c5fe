//! Append-only typed value store backing an [`OlePropertySet`](super::OlePropertySet).
//!
//! Scalars live inline in the value table. Strings and blobs are appended to a
//! flat byte side-store and arrays to a flat id side-store; the value table
//! keeps a `(pos, len)` reference into the matching side-store.

use chrono::{DateTime, Utc};
use std::fmt;
use std::num::NonZeroU32;

/// 1-based handle to a value inside a property set's store.
///
/// The zero id that the on-disk world uses for "absent" is not
/// representable; lookups that can fail return `Option<StoreId>` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StoreId(NonZeroU32);

impl StoreId {
    /// Wrap a raw 1-based id; `None` for zero.
    #[inline]
    pub fn new(id: u32) -> Option<Self> {
        NonZeroU32::new(id).map(StoreId)
    }

    #[inline]
    pub fn get(self) -> u32 {
        self.0.get()
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        (self.0.get() - 1) as usize
    }

    fn from_index(index: usize) -> Option<Self> {
        let id = u32::try_from(index).ok()?.checked_add(1)?;
        Self::new(id)
    }
}

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Kind tag of a stored value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariantType {
    SigInteger,
    UnsInteger,
    Float,
    DateTime,
    String,
    Blob,
    Array,
}

/// A borrowed, typed view of one stored value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value<'a> {
    SigInteger(i64),
    UnsInteger(u64),
    Float(f64),
    DateTime(DateTime<Utc>),
    String(&'a str),
    Blob(&'a [u8]),
    Array(&'a [StoreId]),
}

impl Value<'_> {
    pub fn variant_type(&self) -> VariantType {
        match self {
            Value::SigInteger(_) => VariantType::SigInteger,
            Value::UnsInteger(_) => VariantType::UnsInteger,
            Value::Float(_) => VariantType::Float,
            Value::DateTime(_) => VariantType::DateTime,
            Value::String(_) => VariantType::String,
            Value::Blob(_) => VariantType::Blob,
            Value::Array(_) => VariantType::Array,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Slot {
    SigInteger(i64),
    UnsInteger(u64),
    Float(f64),
    DateTime(DateTime<Utc>),
    String { pos: usize, len: usize },
    Blob { pos: usize, len: usize },
    Array { pos: usize, len: usize },
}

/// Store lengths captured before a speculative decode
#[derive(Debug, Clone, Copy)]
pub(crate) struct Checkpoint {
    values: usize,
    extrastore: usize,
    arraystore: usize,
}

#[derive(Debug, Default, Clone)]
pub(crate) struct VariantStore {
    values: Vec<Slot>,
    extrastore: Vec<u8>,
    arraystore: Vec<StoreId>,
}

impl VariantStore {
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    fn push(&mut self, slot: Slot) -> Option<StoreId> {
        let id = StoreId::from_index(self.values.len())?;
        self.values.push(slot);
        Some(id)
    }

    pub fn push_sig_integer(&mut self, value: i64) -> Option<StoreId> {
        self.push(Slot::SigInteger(value))
    }

    pub fn push_uns_integer(&mut self, value: u64) -> Option<StoreId> {
        self.push(Slot::UnsInteger(value))
    }

    pub fn push_float(&mut self, value: f64) -> Option<StoreId> {
        self.push(Slot::Float(value))
    }

    pub fn push_datetime(&mut self, value: DateTime<Utc>) -> Option<StoreId> {
        self.push(Slot::DateTime(value))
    }

    pub fn push_string(&mut self, value: &str) -> Option<StoreId> {
        let pos = self.extrastore.len();
        self.extrastore.extend_from_slice(value.as_bytes());
        self.push(Slot::String {
            pos,
            len: value.len(),
        })
    }

    pub fn push_blob(&mut self, value: &[u8]) -> Option<StoreId> {
        let pos = self.extrastore.len();
        self.extrastore.extend_from_slice(value);
        self.push(Slot::Blob {
            pos,
            len: value.len(),
        })
    }

    pub fn push_array(&mut self, elements: &[StoreId]) -> Option<StoreId> {
        let pos = self.arraystore.len();
        self.arraystore.extend_from_slice(elements);
        self.push(Slot::Array {
            pos,
            len: elements.len(),
        })
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            values: self.values.len(),
            extrastore: self.extrastore.len(),
            arraystore: self.arraystore.len(),
        }
    }

    /// Drop everything appended since `checkpoint`.
    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        self.values.truncate(checkpoint.values);
        self.extrastore.truncate(checkpoint.extrastore);
        self.arraystore.truncate(checkpoint.arraystore);
    }

    pub fn get(&self, id: StoreId) -> Option<Value<'_>> {
        let value = match *self.values.get(id.index())? {
            Slot::SigInteger(v) => Value::SigInteger(v),
            Slot::UnsInteger(v) => Value::UnsInteger(v),
            Slot::Float(v) => Value::Float(v),
            Slot::DateTime(v) => Value::DateTime(v),
            Slot::String { pos, len } => {
                let bytes = self.extrastore.get(pos..pos + len)?;
                Value::String(std::str::from_utf8(bytes).ok()?)
            },
            Slot::Blob { pos, len } => Value::Blob(self.extrastore.get(pos..pos + len)?),
            Slot::Array { pos, len } => Value::Array(self.arraystore.get(pos..pos + len)?),
        };
        Some(value)
    }
}
