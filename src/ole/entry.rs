use super::consts::*;
use zerocopy::{FromBytes, I32, LE, U16, U32, U64};
use zerocopy_derive::FromBytes as DeriveFromBytes;

/// Raw directory record ("Pps"), 128 bytes on disk.
#[derive(Debug, Clone, DeriveFromBytes)]
#[repr(C)]
#[allow(dead_code)] // color, state and timestamps are not surfaced
pub struct RawDirectoryEntry {
    /// Entry name in UTF-16LE (64 bytes, null-padded)
    name: [u8; 64],
    /// Length of name in bytes (including null terminator)
    name_len: U16<LE>,
    /// Entry type (1 = storage, 2 = stream, 5 = root)
    entry_type: u8,
    /// Node color (0 = red, 1 = black)
    node_color: u8,
    /// Previous sibling index
    prev: I32<LE>,
    /// Next sibling index
    next: I32<LE>,
    /// Index of the root of this storage's child subtree
    child: I32<LE>,
    clsid: [u8; 16],
    state_bits: U32<LE>,
    creation_time: U64<LE>,
    modified_time: U64<LE>,
    start_block: I32<LE>,
    /// Stream size; only the low 32 bits are meaningful with 512-byte blocks
    size: U32<LE>,
    size_high: U32<LE>,
}

impl RawDirectoryEntry {
    /// View one record; `None` if `data` is not exactly [`DIRENTRY_SIZE`] bytes.
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() != DIRENTRY_SIZE {
            return None;
        }
        Self::read_from_bytes(data).ok()
    }

    /// Decoded name, or `None` when the declared length is zero, odd or
    /// longer than the name field.
    pub fn name(&self) -> Option<String> {
        let len = self.name_len.get() as usize;
        if len < 2 || len > self.name.len() || len % 2 != 0 {
            return None;
        }
        let units: Vec<u16> = self.name[..len - 2]
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        Some(String::from_utf16_lossy(&units))
    }

    #[inline]
    pub fn entry_type(&self) -> u8 {
        self.entry_type
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.entry_type == STGTY_ROOT
    }

    #[inline]
    pub fn prev(&self) -> i32 {
        self.prev.get()
    }

    #[inline]
    pub fn next(&self) -> i32 {
        self.next.get()
    }

    #[inline]
    pub fn child(&self) -> i32 {
        self.child.get()
    }

    #[inline]
    pub fn clsid(&self) -> [u8; 16] {
        self.clsid
    }

    #[inline]
    pub fn start_block(&self) -> i32 {
        self.start_block.get()
    }

    #[inline]
    pub fn size(&self) -> u32 {
        self.size.get()
    }
}

/// Format a CLSID as `XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX`, or an empty
/// string for the all-zero CLSID.
pub fn format_clsid(bytes: &[u8; 16]) -> String {
    if bytes.iter().all(|&b| b == 0) {
        return String::new();
    }
    format!(
        "{:08X}-{:04X}-{:04X}-{:02X}{:02X}-{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}",
        u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        u16::from_le_bytes([bytes[4], bytes[5]]),
        u16::from_le_bytes([bytes[6], bytes[7]]),
        bytes[8],
        bytes[9],
        bytes[10],
        bytes[11],
        bytes[12],
        bytes[13],
        bytes[14],
        bytes[15],
    )
}
