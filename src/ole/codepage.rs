//! Codepage decoding for property-set strings.
//!
//! Property sets carry their text in the section's declared Windows codepage.
//! This module maps those codepage identifiers onto `encoding_rs` encodings
//! and converts to UTF-8, falling back to Windows-1252 (a Latin-1 superset)
//! for codepages it does not know.

use super::consts::{CP_DEFAULT, CP_WINUNICODE};
use encoding_rs::Encoding;

/// Map Windows codepage identifier to encoding_rs Encoding
///
/// Returns `None` for codepages without an `encoding_rs` counterpart.
#[inline]
pub fn codepage_to_encoding(codepage: u16) -> Option<&'static Encoding> {
    match codepage {
        // DOS codepages
        437 => Some(encoding_rs::IBM866), // IBM866 (close approximation to CP437)
        866 => Some(encoding_rs::IBM866),

        // Windows codepages (Western scripts)
        874 => Some(encoding_rs::WINDOWS_874),
        1250 => Some(encoding_rs::WINDOWS_1250),
        1251 => Some(encoding_rs::WINDOWS_1251),
        1252 => Some(encoding_rs::WINDOWS_1252),
        1253 => Some(encoding_rs::WINDOWS_1253),
        1254 => Some(encoding_rs::WINDOWS_1254),
        1255 => Some(encoding_rs::WINDOWS_1255),
        1256 => Some(encoding_rs::WINDOWS_1256),
        1257 => Some(encoding_rs::WINDOWS_1257),
        1258 => Some(encoding_rs::WINDOWS_1258),

        // East Asian codepages
        932 => Some(encoding_rs::SHIFT_JIS),
        936 => Some(encoding_rs::GBK),
        949 => Some(encoding_rs::EUC_KR),
        950 => Some(encoding_rs::BIG5),
        20932 => Some(encoding_rs::EUC_JP),
        54936 => Some(encoding_rs::GB18030),

        // ISO 8859 series
        28591 => Some(encoding_rs::WINDOWS_1252),
        28592 => Some(encoding_rs::ISO_8859_2),
        28593 => Some(encoding_rs::ISO_8859_3),
        28594 => Some(encoding_rs::ISO_8859_4),
        28595 => Some(encoding_rs::ISO_8859_5),
        28596 => Some(encoding_rs::ISO_8859_6),
        28597 => Some(encoding_rs::ISO_8859_7),
        28598 => Some(encoding_rs::ISO_8859_8),
        28605 => Some(encoding_rs::ISO_8859_15),

        // Macintosh
        10000 => Some(encoding_rs::MACINTOSH),

        // Unicode
        CP_WINUNICODE => Some(encoding_rs::UTF_16LE),
        1201 => Some(encoding_rs::UTF_16BE),
        65001 => Some(encoding_rs::UTF_8),

        _ => None,
    }
}

/// Decode `bytes` from `codepage` into UTF-8.
///
/// Unknown codepages decode as Windows-1252; malformed sequences become
/// U+FFFD. No terminator handling is done here.
///
/// # Examples
///
/// ```
/// use docfile::ole::codepage::decode_bytes;
///
/// assert_eq!(decode_bytes(b"caf\xE9", 1252), "café");
/// assert_eq!(decode_bytes("café".as_bytes(), 65001), "café");
/// assert_eq!(decode_bytes(b"abc", 4242), "abc");
/// ```
pub fn decode_bytes(bytes: &[u8], codepage: u16) -> String {
    let encoding = codepage_to_encoding(codepage)
        .or_else(|| codepage_to_encoding(CP_DEFAULT))
        .unwrap_or(encoding_rs::WINDOWS_1252);
    encoding.decode_without_bom_handling(bytes).0.into_owned()
}

/// Decode UTF-16LE bytes to a String
///
/// A trailing odd byte is ignored and unpaired surrogates become U+FFFD.
#[inline]
pub fn decode_utf16le(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|chunk| u16::from_le_bytes([chunk[0], chunk[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

/// Width in bytes of the NUL terminator for strings in `codepage`
#[inline]
pub fn terminator_width(codepage: u16) -> usize {
    if codepage == CP_WINUNICODE || codepage == 1201 { 2 } else { 1 }
}
