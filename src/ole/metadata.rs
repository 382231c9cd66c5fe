use super::consts::*;
use super::docfile::Docfile;
use super::propset::{OlePropertySet, Section, Value};
use super::source::ByteSource;
use crate::common::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// SummaryInformation property ids
mod pid {
    pub const CODEPAGE: u32 = 1;
    pub const TITLE: u32 = 2;
    pub const SUBJECT: u32 = 3;
    pub const AUTHOR: u32 = 4;
    pub const KEYWORDS: u32 = 5;
    pub const COMMENTS: u32 = 6;
    pub const TEMPLATE: u32 = 7;
    pub const LAST_AUTHOR: u32 = 8;
    pub const REVISION: u32 = 9;
    pub const LAST_PRINTED: u32 = 11;
    pub const CREATED: u32 = 12;
    pub const LAST_SAVED: u32 = 13;
    pub const PAGE_COUNT: u32 = 14;
    pub const WORD_COUNT: u32 = 15;
    pub const CHAR_COUNT: u32 = 16;
    pub const APPLICATION: u32 = 18;
    pub const SECURITY: u32 = 19;
}

/// DocumentSummaryInformation property ids
mod doc_pid {
    pub const CATEGORY: u32 = 2;
    pub const MANAGER: u32 = 14;
    pub const COMPANY: u32 = 15;
}

/// Metadata extracted from the standard property-set streams
///
/// Fields come from `\x05SummaryInformation` and
/// `\x05DocumentSummaryInformation`; either stream may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OleMetadata {
    // SummaryInformation properties
    pub codepage: Option<u16>,
    pub title: Option<String>,
    pub subject: Option<String>,
    pub author: Option<String>,
    pub keywords: Option<String>,
    pub comments: Option<String>,
    pub template: Option<String>,
    pub last_author: Option<String>,
    pub revision: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub last_saved: Option<DateTime<Utc>>,
    pub last_printed: Option<DateTime<Utc>>,
    pub page_count: Option<u32>,
    pub word_count: Option<u32>,
    pub char_count: Option<u32>,
    pub application: Option<String>,
    pub security: Option<u32>,

    // DocumentSummaryInformation properties
    pub category: Option<String>,
    pub manager: Option<String>,
    pub company: Option<String>,
}

impl OleMetadata {
    /// Whether any field was found
    pub fn has_data(&self) -> bool {
        *self != OleMetadata::default()
    }

    /// Fill SummaryInformation fields from a parsed property set.
    pub fn apply_summary_information(&mut self, set: &OlePropertySet) {
        let Some(section) = set.section(&FMTID_SUMMARY_INFORMATION) else {
            return;
        };
        let text = |id| string(set, section, id);
        let count = |id| integer(set, section, id).and_then(|v| u32::try_from(v).ok());
        let time = |id| datetime(set, section, id);

        self.codepage = integer(set, section, pid::CODEPAGE).map(|v| v as u16);
        self.title = text(pid::TITLE);
        self.subject = text(pid::SUBJECT);
        self.author = text(pid::AUTHOR);
        self.keywords = text(pid::KEYWORDS);
        self.comments = text(pid::COMMENTS);
        self.template = text(pid::TEMPLATE);
        self.last_author = text(pid::LAST_AUTHOR);
        self.revision = text(pid::REVISION);
        self.last_printed = time(pid::LAST_PRINTED);
        self.created = time(pid::CREATED);
        self.last_saved = time(pid::LAST_SAVED);
        self.page_count = count(pid::PAGE_COUNT);
        self.word_count = count(pid::WORD_COUNT);
        self.char_count = count(pid::CHAR_COUNT);
        self.application = text(pid::APPLICATION);
        self.security = count(pid::SECURITY);
    }

    /// Fill DocumentSummaryInformation fields from a parsed property set.
    pub fn apply_document_summary_information(&mut self, set: &OlePropertySet) {
        let Some(section) = set.section(&FMTID_DOC_SUMMARY_INFORMATION) else {
            return;
        };
        self.category = string(set, section, doc_pid::CATEGORY);
        self.manager = string(set, section, doc_pid::MANAGER);
        self.company = string(set, section, doc_pid::COMPANY);
    }
}

fn string(set: &OlePropertySet, section: &Section, id: u32) -> Option<String> {
    let text = set.get_string(section.property(id)?)?;
    (!text.is_empty()).then(|| text.to_string())
}

/// Integer property regardless of signedness (VT_I2 / VT_I4 / VT_UI4 ...)
fn integer(set: &OlePropertySet, section: &Section, id: u32) -> Option<i64> {
    match set.value(section.property(id)?)? {
        Value::SigInteger(v) => Some(v),
        Value::UnsInteger(v) => i64::try_from(v).ok(),
        _ => None,
    }
}

/// Timestamps at the zero sentinel mean "never" and are dropped.
///
/// Office writes zero ticks for unset times, which decode to the Unix epoch;
/// a genuine 1970-01-01T00:00:00Z timestamp is dropped along with them.
fn datetime(set: &OlePropertySet, section: &Section, id: u32) -> Option<DateTime<Utc>> {
    set.get_datetime(section.property(id)?)
        .filter(|t| *t != DateTime::<Utc>::UNIX_EPOCH)
}

impl<S: ByteSource> Docfile<S> {
    /// Parse metadata from the standard property streams.
    ///
    /// Missing or unparsable streams leave their fields empty; only a
    /// failure to read a stream that exists is an error.
    pub fn metadata(&self) -> Result<OleMetadata> {
        let mut metadata = OleMetadata::default();

        if let Some(set) = self.optional_property_set(SUMMARY_INFORMATION)? {
            metadata.apply_summary_information(&set);
        }
        if let Some(set) = self.optional_property_set(DOCUMENT_SUMMARY_INFORMATION)? {
            metadata.apply_document_summary_information(&set);
        }

        Ok(metadata)
    }

    fn optional_property_set(&self, name: &str) -> Result<Option<OlePropertySet>> {
        let Some(file) = self.root().find_file(name) else {
            return Ok(None);
        };
        let data = self.open_ole_file(file)?.read_to_vec()?;
        match OlePropertySet::parse(&data) {
            Ok(set) => Ok(Some(set)),
            Err(e) => {
                debug!(stream = name, error = %e, "ignoring unparsable property set");
                Ok(None)
            },
        }
    }
}
