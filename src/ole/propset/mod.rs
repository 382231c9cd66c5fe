//! OLE property-set parsing ([MS-OLEPS]).
//!
//! A property-set stream is a small header followed by one or more sections.
//! Each section maps property ids to typed VARIANT values. Parsing
//! materializes every value into a single append-only store owned by the
//! [`OlePropertySet`]; sections hold 1-based [`StoreId`]s into that store and
//! the typed accessors resolve them.
//!
//! # Example
//!
//! ```no_run
//! use docfile::ole::Docfile;
//! use docfile::ole::consts::{FMTID_SUMMARY_INFORMATION, SUMMARY_INFORMATION};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let doc = Docfile::open(std::fs::File::open("report.doc")?)?;
//! let props = doc.property_set(&[SUMMARY_INFORMATION])?;
//! if let Some(section) = props.section(&FMTID_SUMMARY_INFORMATION)
//!     && let Some(id) = section.property(2)
//! {
//!     println!("title: {:?}", props.get_string(id));
//! }
//! # Ok(())
//! # }
//! ```

mod section;
mod store;
mod variant;


pub use section::Section;
pub use store::{StoreId, Value, VariantType};
pub use variant::{filetime_to_datetime, ole_date_to_datetime};

use crate::common::binary::{read_guid, read_u16_le, read_u32_le};
use crate::common::{DocfileError, Result};
use crate::ole::consts::*;
use chrono::{DateTime, Utc};
use store::VariantStore;
use tracing::debug;

/// Size of the property-set header
const SET_HEADER_SIZE: usize = 0x1C;
/// Size of one (format id, offset) section locator
const SECTION_LOCATOR_SIZE: usize = 20;

/// Options for [`OlePropertySet::parse_with_options`]
#[derive(Debug, Clone)]
pub struct PropertySetOptions {
    /// Codepage for sections without a codepage property
    pub default_codepage: u16,
    /// Deepest VARIANT / vector nesting decoded before a value is rejected
    pub max_nesting: usize,
}

impl Default for PropertySetOptions {
    fn default() -> Self {
        Self {
            default_codepage: CP_DEFAULT,
            max_nesting: 8,
        }
    }
}

impl PropertySetOptions {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn with_default_codepage(mut self, codepage: u16) -> Self {
        self.default_codepage = codepage;
        self
    }

    #[inline]
    pub fn with_max_nesting(mut self, max_nesting: usize) -> Self {
        self.max_nesting = max_nesting;
        self
    }
}

/// A parsed property-set stream.
#[derive(Debug, Clone)]
pub struct OlePropertySet {
    version: u16,
    os_version: u32,
    clsid: [u8; 16],
    sections: Vec<Section>,
    store: VariantStore,
}

impl OlePropertySet {
    /// Parse a whole property-set stream with default options.
    pub fn parse(data: &[u8]) -> Result<Self> {
        Self::parse_with_options(data, &PropertySetOptions::default())
    }

    /// Parse a whole property-set stream.
    ///
    /// The set header and every section header must be readable; individual
    /// properties that fail to decode are recorded as absent.
    pub fn parse_with_options(data: &[u8], options: &PropertySetOptions) -> Result<Self> {
        if data.len() < SET_HEADER_SIZE {
            return Err(DocfileError::PropertySet(format!(
                "stream is {} bytes, shorter than the set header",
                data.len()
            )));
        }
        let byte_order = read_u16_le(data, 0)?;
        if byte_order != BYTE_ORDER_LE {
            return Err(DocfileError::PropertySet(format!(
                "unexpected byte order mark {byte_order:#06x}"
            )));
        }
        let version = read_u16_le(data, 2)?;
        let os_version = read_u32_le(data, 4)?;
        let clsid = read_guid(data, 8)?;
        let count = read_u32_le(data, 0x18)? as usize;

        let room = (data.len() - SET_HEADER_SIZE) / SECTION_LOCATOR_SIZE;
        if count > room {
            return Err(DocfileError::PropertySet(format!(
                "{count} sections declared, room for {room}"
            )));
        }

        // First pass: locate every section, since each one ends where the next begins.
        let mut locators = Vec::with_capacity(count);
        for index in 0..count {
            let at = SET_HEADER_SIZE + index * SECTION_LOCATOR_SIZE;
            let format_id = read_guid(data, at)?;
            let offset = read_u32_le(data, at + 16)? as usize;
            locators.push((format_id, offset));
        }

        let mut store = VariantStore::default();
        let mut sections = Vec::with_capacity(count);
        for &(format_id, offset) in &locators {
            let limit = locators
                .iter()
                .map(|&(_, other)| other)
                .filter(|&other| other > offset)
                .min()
                .unwrap_or(data.len());
            sections.push(section::parse_section(
                data, format_id, offset, limit, options, &mut store,
            )?);
        }

        debug!(
            sections = sections.len(),
            values = store.len(),
            "parsed property set"
        );
        Ok(OlePropertySet {
            version,
            os_version,
            clsid,
            sections,
            store,
        })
    }

    /// Property-set format version (0 or 1)
    #[inline]
    pub fn version(&self) -> u16 {
        self.version
    }

    /// Originating OS version word
    #[inline]
    pub fn os_version(&self) -> u32 {
        self.os_version
    }

    #[inline]
    pub fn clsid(&self) -> &[u8; 16] {
        &self.clsid
    }

    #[inline]
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// First section with the given format id
    pub fn section(&self, format_id: &[u8; 16]) -> Option<&Section> {
        self.sections.iter().find(|s| s.format_id() == format_id)
    }

    /// Number of values in the store (including vector elements)
    #[inline]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.store.len() == 0
    }

    /// Kind of a stored value.
    ///
    /// Unlike the typed accessors this fails loudly: an id that does not
    /// belong to this set is a caller bug.
    pub fn get_type(&self, id: StoreId) -> Result<VariantType> {
        self.store
            .get(id)
            .map(|v| v.variant_type())
            .ok_or(DocfileError::InvalidStoreId(id.get()))
    }

    /// Typed view of a stored value
    #[inline]
    pub fn value(&self, id: StoreId) -> Option<Value<'_>> {
        self.store.get(id)
    }

    pub fn get_sig_integer(&self, id: StoreId) -> Option<i64> {
        match self.value(id)? {
            Value::SigInteger(v) => Some(v),
            _ => None,
        }
    }

    pub fn get_uns_integer(&self, id: StoreId) -> Option<u64> {
        match self.value(id)? {
            Value::UnsInteger(v) => Some(v),
            _ => None,
        }
    }

    pub fn get_float(&self, id: StoreId) -> Option<f64> {
        match self.value(id)? {
            Value::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn get_datetime(&self, id: StoreId) -> Option<DateTime<Utc>> {
        match self.value(id)? {
            Value::DateTime(v) => Some(v),
            _ => None,
        }
    }

    pub fn get_string(&self, id: StoreId) -> Option<&str> {
        match self.value(id)? {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    /// Raw bytes of a blob, CLSID or clipboard value
    pub fn get_bytes(&self, id: StoreId) -> Option<&[u8]> {
        match self.value(id)? {
            Value::Blob(v) => Some(v),
            _ => None,
        }
    }

    /// Element ids of a vector or array value
    pub fn get_array(&self, id: StoreId) -> Option<&[StoreId]> {
        match self.value(id)? {
            Value::Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn get_array_len(&self, id: StoreId) -> Option<usize> {
        self.get_array(id).map(<[StoreId]>::len)
    }

    pub fn get_array_element(&self, id: StoreId, index: usize) -> Option<StoreId> {
        self.get_array(id)?.get(index).copied()
    }
}
