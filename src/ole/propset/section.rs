use super::PropertySetOptions;
use super::store::{StoreId, Value, VariantStore};
use super::variant::VariantDecoder;
use crate::common::binary::{BinaryError, BinaryResult, align4, read_u32_le, slice_at};
use crate::common::{DocfileError, Result};
use crate::ole::codepage::{decode_bytes, decode_utf16le};
use crate::ole::consts::*;
use crate::ole::entry::format_clsid;
use std::collections::BTreeMap;
use tracing::warn;

/// Size of the section header (byte size + property count)
const SECTION_HEADER_SIZE: usize = 8;
/// Size of one (property id, offset) table entry
const PROPERTY_ENTRY_SIZE: usize = 8;

/// One section of a property set: a format id, the property table and an
/// optional id-to-name dictionary.
#[derive(Debug, Clone)]
pub struct Section {
    format_id: [u8; 16],
    offset: usize,
    codepage: u16,
    properties: BTreeMap<u32, Option<StoreId>>,
    dictionary: BTreeMap<u32, String>,
}

impl Section {
    /// Format id as stored on disk
    #[inline]
    pub fn format_id(&self) -> &[u8; 16] {
        &self.format_id
    }

    /// Format id as `XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX`
    pub fn format_id_string(&self) -> String {
        format_clsid(&self.format_id)
    }

    /// Byte offset of the section within the stream
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Codepage the section's strings were decoded with
    #[inline]
    pub fn codepage(&self) -> u16 {
        self.codepage
    }

    /// Store id of a property; `None` when the property is absent or failed to decode.
    #[inline]
    pub fn property(&self, id: u32) -> Option<StoreId> {
        self.properties.get(&id).copied().flatten()
    }

    /// Whether the property table lists `id`, decoded or not
    #[inline]
    pub fn contains(&self, id: u32) -> bool {
        self.properties.contains_key(&id)
    }

    /// Properties in id order, with `None` for values that failed to decode
    pub fn properties(&self) -> impl Iterator<Item = (u32, Option<StoreId>)> + '_ {
        self.properties.iter().map(|(&id, &store)| (id, store))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Dictionary name of a property id
    pub fn name(&self, id: u32) -> Option<&str> {
        self.dictionary.get(&id).map(String::as_str)
    }

    #[inline]
    pub fn dictionary(&self) -> &BTreeMap<u32, String> {
        &self.dictionary
    }
}

/// Parse the section starting at `start`; `limit` is where the next section
/// (or the data) begins.
///
/// A header that cannot be read fails the call. A property table that runs
/// past the section keeps the entries that fit and drops the rest.
pub(crate) fn parse_section(
    data: &[u8],
    format_id: [u8; 16],
    start: usize,
    limit: usize,
    options: &PropertySetOptions,
    store: &mut VariantStore,
) -> Result<Section> {
    let header_error =
        |e: BinaryError| DocfileError::PropertySet(format!("section header at {start:#x}: {e}"));
    let declared_size = read_u32_le(data, start).map_err(header_error)? as usize;
    let count = read_u32_le(data, start + 4).map_err(header_error)? as usize;

    let end = start.saturating_add(declared_size).min(limit).min(data.len());
    if end < start + SECTION_HEADER_SIZE {
        return Err(DocfileError::PropertySet(format!(
            "section at {start:#x} is {declared_size} bytes, smaller than its header"
        )));
    }
    let bytes = &data[start..end];

    let room = (bytes.len() - SECTION_HEADER_SIZE) / PROPERTY_ENTRY_SIZE;
    if count > room {
        warn!(
            section = start,
            declared = count,
            parsed = room,
            "property table overruns its section"
        );
    }
    let mut table = Vec::with_capacity(count.min(room));
    for index in 0..count.min(room) {
        let entry = SECTION_HEADER_SIZE + index * PROPERTY_ENTRY_SIZE;
        let id = read_u32_le(bytes, entry)?;
        let offset = read_u32_le(bytes, entry + 4)? as usize;
        table.push((id, offset));
    }

    let mut section = Section {
        format_id,
        offset: start,
        codepage: options.default_codepage,
        properties: BTreeMap::new(),
        dictionary: BTreeMap::new(),
    };

    // The codepage governs every string, so it is applied before anything else.
    for &(id, offset) in table.iter().filter(|(id, _)| *id == PID_CODEPAGE) {
        let stored = decode_one(bytes, offset, section.codepage, options, store, id);
        if let Some(codepage) = stored.and_then(|sid| codepage_value(store, sid)) {
            section.codepage = codepage;
        }
        section.properties.insert(id, stored);
    }

    for &(id, offset) in &table {
        if id == PID_CODEPAGE || id == PID_DICTIONARY {
            continue;
        }
        let stored = decode_one(bytes, offset, section.codepage, options, store, id);
        section.properties.insert(id, stored);
    }

    if let Some(&(_, offset)) = table.iter().find(|(id, _)| *id == PID_DICTIONARY)
        && let Err(e) = parse_dictionary(bytes, offset, section.codepage, &mut section.dictionary)
    {
        warn!(
            section = start,
            entries = section.dictionary.len(),
            error = %e,
            "truncated property dictionary"
        );
    }

    Ok(section)
}

fn decode_one(
    bytes: &[u8],
    offset: usize,
    codepage: u16,
    options: &PropertySetOptions,
    store: &mut VariantStore,
    id: u32,
) -> Option<StoreId> {
    let mut decoder = VariantDecoder::new(bytes, codepage, options.max_nesting, store);
    match decoder.decode_property(offset) {
        Ok((stored, _)) => Some(stored),
        Err(e) => {
            warn!(property = id, offset, error = %e, "skipping malformed property");
            None
        },
    }
}

fn codepage_value(store: &VariantStore, id: StoreId) -> Option<u16> {
    // VT_I2 stores 65001 as -535
    match store.get(id)? {
        Value::SigInteger(v) => Some(v as u16),
        Value::UnsInteger(v) => u16::try_from(v).ok(),
        _ => None,
    }
}

/// Read the dictionary at `offset` into `out`, keeping whatever entries were
/// read before a failure.
fn parse_dictionary(
    bytes: &[u8],
    offset: usize,
    codepage: u16,
    out: &mut BTreeMap<u32, String>,
) -> BinaryResult<()> {
    let count = read_u32_le(bytes, offset)? as usize;
    let unicode = codepage == CP_WINUNICODE;
    let mut pos = offset + 4;
    for _ in 0..count {
        let id = read_u32_le(bytes, pos)?;
        let size = read_u32_le(bytes, pos + 4)? as usize;
        pos += 8;
        let name = if unicode {
            let raw = slice_at(bytes, pos, size.saturating_mul(2))?;
            pos += align4(raw.len());
            let mut name = decode_utf16le(raw);
            if name.ends_with('\0') {
                name.pop();
            }
            name
        } else {
            let raw = slice_at(bytes, pos, size)?;
            pos += raw.len();
            let raw = raw.strip_suffix(&[0]).unwrap_or(raw);
            decode_bytes(raw, codepage)
        };
        out.insert(id, name);
    }
    Ok(())
}
