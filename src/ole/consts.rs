/// Magic bytes that should be at the beginning of every compound file
pub const MAGIC: &[u8; 8] = b"\xD0\xCF\x11\xE0\xA1\xB1\x1A\xE1";

/// Size of the fixed file header, always kept resident
pub const HEADER_SIZE: usize = 512;

/// Minimal size of an empty compound file (header, one FAT block, one directory block)
pub const MINIMAL_OLEFILE_SIZE: usize = 1536;

/// Size of a directory entry in bytes
pub const DIRENTRY_SIZE: usize = 128;

/// Big block size; the only dialect this reader accepts (sector shift 9)
pub const BIG_BLOCK_SIZE: usize = 512;
/// Sector shift matching [`BIG_BLOCK_SIZE`]
pub const BIG_BLOCK_SHIFT: u16 = 9;

/// Small ("mini") block size (sector shift 6)
pub const SMALL_BLOCK_SIZE: usize = 64;
/// Sector shift matching [`SMALL_BLOCK_SIZE`]
pub const SMALL_BLOCK_SHIFT: u16 = 6;

/// Streams strictly below this size live in the small-block space
pub const SMALL_STREAM_CUTOFF: u32 = 0x1000;

/// Byte-order marker required in the header
pub const BYTE_ORDER_LE: u16 = 0xFFFE;

/// Block indices stored per FAT block
pub const INDICES_PER_BLOCK: usize = BIG_BLOCK_SIZE / 4;

/// FAT block pointers held inline in the header
pub const HEADER_FAT_SLOTS: usize = 109;

/// Forward pointers per extended FAT page; the last slot links to the next page
pub const EXTENDED_FAT_SLOTS: usize = INDICES_PER_BLOCK - 1;

// Block index sentinels
/// Unallocated block
pub const FREE_BLOCK: i32 = -1;
/// End of a block chain
pub const END_OF_CHAIN: i32 = -2;
/// Block owned by the allocation table itself
pub const SPECIAL_BLOCK: i32 = -3;
/// Block holding an extended FAT page
pub const EXTENSION_BLOCK: i32 = -4;

/// Unused directory link
pub const NO_STREAM: i32 = -1;

// Directory entry types
/// Empty directory entry
pub const STGTY_EMPTY: u8 = 0;
/// Element is a storage object
pub const STGTY_STORAGE: u8 = 1;
/// Element is a stream object
pub const STGTY_STREAM: u8 = 2;
/// Element is the root storage
pub const STGTY_ROOT: u8 = 5;

// Property types
pub const VT_EMPTY: u16 = 0;
pub const VT_NULL: u16 = 1;
pub const VT_I2: u16 = 2;
pub const VT_I4: u16 = 3;
pub const VT_R4: u16 = 4;
pub const VT_R8: u16 = 5;
pub const VT_CY: u16 = 6;
pub const VT_DATE: u16 = 7;
pub const VT_BSTR: u16 = 8;
pub const VT_ERROR: u16 = 10;
pub const VT_BOOL: u16 = 11;
pub const VT_VARIANT: u16 = 12;
pub const VT_DECIMAL: u16 = 14;
pub const VT_I1: u16 = 16;
pub const VT_UI1: u16 = 17;
pub const VT_UI2: u16 = 18;
pub const VT_UI4: u16 = 19;
pub const VT_I8: u16 = 20;
pub const VT_UI8: u16 = 21;
pub const VT_INT: u16 = 22;
pub const VT_UINT: u16 = 23;
pub const VT_LPSTR: u16 = 30;
pub const VT_LPWSTR: u16 = 31;
pub const VT_FILETIME: u16 = 64;
pub const VT_BLOB: u16 = 65;
pub const VT_BLOB_OBJECT: u16 = 70;
pub const VT_CF: u16 = 71;
pub const VT_CLSID: u16 = 72;
pub const VT_VECTOR: u16 = 0x1000;
pub const VT_ARRAY: u16 = 0x2000;
/// Mask selecting the base type below the vector/array flags
pub const VT_TYPEMASK: u16 = 0x0FFF;

/// Property id reserved for the id-to-name dictionary
pub const PID_DICTIONARY: u32 = 0;
/// Property id holding the section codepage
pub const PID_CODEPAGE: u32 = 1;

/// Codepage marking UTF-16LE strings
pub const CP_WINUNICODE: u16 = 1200;
/// Codepage used when a section declares none
pub const CP_DEFAULT: u16 = 1252;

/// Seconds between 1601-01-01 and 1970-01-01
pub const FILETIME_UNIX_EPOCH_SECS: u64 = 11_644_473_600;
/// FILETIME ticks (100ns) per second
pub const FILETIME_TICKS_PER_SEC: u64 = 10_000_000;

/// Stream name of the SummaryInformation property set
pub const SUMMARY_INFORMATION: &str = "\u{0005}SummaryInformation";
/// Stream name of the DocumentSummaryInformation property set
pub const DOCUMENT_SUMMARY_INFORMATION: &str = "\u{0005}DocumentSummaryInformation";

/// FMTID_SummaryInformation {F29F85E0-4FF9-1068-AB91-08002B27B3D9} in on-disk byte order
pub const FMTID_SUMMARY_INFORMATION: [u8; 16] = [
    0xE0, 0x85, 0x9F, 0xF2, 0xF9, 0x4F, 0x68, 0x10, 0xAB, 0x91, 0x08, 0x00, 0x2B, 0x27, 0xB3, 0xD9,
];
/// FMTID_DocSummaryInformation {D5CDD502-2E9C-101B-9397-08002B2CF9AE} in on-disk byte order
pub const FMTID_DOC_SUMMARY_INFORMATION: [u8; 16] = [
    0x02, 0xD5, 0xCD, 0xD5, 0x9C, 0x2E, 0x1B, 0x10, 0x93, 0x97, 0x08, 0x00, 0x2B, 0x2C, 0xF9, 0xAE,
];
