use super::consts::*;
use crate::common::{DocfileError, Result};
use tracing::warn;
use zerocopy::{FromBytes, I32, LE, U16, U32};
use zerocopy_derive::FromBytes as DeriveFromBytes;

/// On-disk compound file header (512 bytes, little-endian)
#[derive(Debug, Clone, DeriveFromBytes)]
#[repr(C)]
struct RawHeader {
    magic: [u8; 8],
    clsid: [u8; 16],
    minor_version: U16<LE>,
    major_version: U16<LE>,
    byte_order: U16<LE>,
    big_block_shift: U16<LE>,
    small_block_shift: U16<LE>,
    reserved: [u8; 6],
    num_dir_blocks: U32<LE>,
    /// Number of blocks holding the big-block FAT ("big block depot")
    num_fat_blocks: U32<LE>,
    root_start_block: I32<LE>,
    transaction_signature: U32<LE>,
    small_stream_cutoff: U32<LE>,
    /// First block of the small-block FAT ("small block depot")
    small_depot_start: I32<LE>,
    num_small_depot_blocks: U32<LE>,
    extended_fat_start: I32<LE>,
    num_extended_fat_blocks: U32<LE>,
    fat_blocks: [I32<LE>; HEADER_FAT_SLOTS],
}

/// Parsed and validated file header.
///
/// Only the 512-byte / 64-byte sector dialect with a 0x1000 small-stream
/// cutoff is accepted.
#[derive(Debug, Clone)]
pub struct Header {
    pub major_version: u16,
    pub minor_version: u16,
    pub num_fat_blocks: u32,
    pub root_start_block: i32,
    pub small_depot_start: i32,
    pub num_small_depot_blocks: u32,
    pub extended_fat_start: i32,
    pub num_extended_fat_blocks: u32,
    pub fat_blocks: [i32; HEADER_FAT_SLOTS],
}

impl Header {
    /// Parse the resident header block, rejecting any unsupported dialect.
    pub fn parse(block: &[u8; HEADER_SIZE], strict: bool) -> Result<Self> {
        if !has_signature(block) {
            return Err(DocfileError::NotDocfile);
        }
        let raw = RawHeader::read_from_bytes(block.as_slice())
            .map_err(|_| DocfileError::CorruptedFile("Failed to parse header".to_string()))?;

        let byte_order = raw.byte_order.get();
        if byte_order != BYTE_ORDER_LE {
            return Err(DocfileError::UnsupportedFormat(format!(
                "byte order marker {byte_order:#06x}"
            )));
        }
        let big_shift = raw.big_block_shift.get();
        if big_shift != BIG_BLOCK_SHIFT {
            return Err(DocfileError::UnsupportedFormat(format!(
                "big block shift {big_shift}"
            )));
        }
        let small_shift = raw.small_block_shift.get();
        if small_shift != SMALL_BLOCK_SHIFT {
            return Err(DocfileError::UnsupportedFormat(format!(
                "small block shift {small_shift}"
            )));
        }
        let cutoff = raw.small_stream_cutoff.get();
        if cutoff != SMALL_STREAM_CUTOFF {
            return Err(DocfileError::UnsupportedFormat(format!(
                "small stream cutoff {cutoff:#x}"
            )));
        }

        let major_version = raw.major_version.get();
        if major_version != 3 {
            if strict {
                return Err(DocfileError::UnsupportedFormat(format!(
                    "major version {major_version}"
                )));
            }
            warn!(major_version, "unexpected major version with 512-byte sectors");
        }

        let mut fat_blocks = [FREE_BLOCK; HEADER_FAT_SLOTS];
        for (slot, raw_slot) in fat_blocks.iter_mut().zip(raw.fat_blocks.iter()) {
            *slot = raw_slot.get();
        }

        Ok(Header {
            major_version,
            minor_version: raw.minor_version.get(),
            num_fat_blocks: raw.num_fat_blocks.get(),
            root_start_block: raw.root_start_block.get(),
            small_depot_start: raw.small_depot_start.get(),
            num_small_depot_blocks: raw.num_small_depot_blocks.get(),
            extended_fat_start: raw.extended_fat_start.get(),
            num_extended_fat_blocks: raw.num_extended_fat_blocks.get(),
            fat_blocks,
        })
    }
}

/// Check whether `data` starts with the 8-byte compound file signature.
pub fn has_signature(data: &[u8]) -> bool {
    data.len() >= MAGIC.len() && &data[..MAGIC.len()] == MAGIC
}

/// Check if a file/data is a compound file by checking magic bytes and minimal size
pub fn is_ole_file(data: &[u8]) -> bool {
    data.len() >= MINIMAL_OLEFILE_SIZE && has_signature(data)
}
