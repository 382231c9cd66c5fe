use super::{BigBlockTable, Fat};
use crate::common::binary::read_i32_le;
use crate::common::{DocfileError, Result};
use crate::ole::consts::*;
use crate::ole::source::ByteSource;
use crate::ole::tree::Entry;
use tracing::{debug, warn};

/// The small-block ("mini") allocation table.
///
/// Small blocks are 64-byte slices of the stream owned by the root directory
/// entry, which itself lives in big blocks. The table can only be loaded
/// once the root entry is known, so construction is two-phase: [`new`]
/// yields an empty table and [`load_fat`] fills it in.
///
/// [`new`]: SmallBlockTable::new
/// [`load_fat`]: SmallBlockTable::load_fat
#[derive(Debug, Clone, Default)]
pub struct SmallBlockTable {
    fat: Fat,
    /// Big blocks of the root entry's stream, in chain order
    container_blocks: Vec<i32>,
    /// Declared byte length of the root entry's stream
    container_size: u64,
}

impl SmallBlockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the table from the small-block depot chain starting at
    /// `depot_start` and remember where the root entry keeps its blocks.
    pub fn load_fat<S: ByteSource>(
        &mut self,
        big: &BigBlockTable<S>,
        depot_start: i32,
        root: &Entry,
    ) -> Result<()> {
        let raw = if depot_start < 0 {
            Vec::new()
        } else {
            big.read_chain(depot_start)?
        };
        let declared = big.header().num_small_depot_blocks as usize;
        let found = raw.len() / BIG_BLOCK_SIZE;
        if declared != found {
            warn!(declared, found, "small block depot length differs from header");
        }
        let entries = (0..raw.len() / 4)
            .map(|i| read_i32_le(&raw, i * 4))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let fat = Fat::new(entries);
        fat.validate()?;

        let container_blocks = if root.first_block < 0 {
            Vec::new()
        } else {
            big.fat().collect_chain(root.first_block)?
        };
        let capacity = (container_blocks.len() * BIG_BLOCK_SIZE) as u64;
        if (root.size as u64) > capacity {
            warn!(
                declared = root.size,
                capacity, "small block container shorter than declared, clamping"
            );
        }

        debug!(
            entries = fat.len(),
            container_blocks = container_blocks.len(),
            "loaded small block allocation table"
        );
        self.fat = fat;
        self.container_size = (root.size as u64).min(capacity);
        self.container_blocks = container_blocks;
        Ok(())
    }

    /// The loaded allocation table
    #[inline]
    pub fn fat(&self) -> &Fat {
        &self.fat
    }

    /// Translate small block `block` into a big block index and the byte
    /// offset of the small block inside it.
    pub fn locate(&self, block: i32) -> Result<(i32, usize)> {
        if block < 0 {
            return Err(DocfileError::CorruptedFile(format!(
                "invalid small block index {block}"
            )));
        }
        let byte_pos = block as u64 * SMALL_BLOCK_SIZE as u64;
        let limit = self.container_size.next_multiple_of(SMALL_BLOCK_SIZE as u64);
        if byte_pos + SMALL_BLOCK_SIZE as u64 > limit {
            return Err(DocfileError::CorruptedFile(format!(
                "small block {block} beyond the small block container"
            )));
        }
        let big_index = (byte_pos / BIG_BLOCK_SIZE as u64) as usize;
        let big_block = *self.container_blocks.get(big_index).ok_or_else(|| {
            DocfileError::CorruptedFile(format!("small block {block} has no backing big block"))
        })?;
        Ok((big_block, (byte_pos % BIG_BLOCK_SIZE as u64) as usize))
    }

    /// Read small block `block` through the big-block cache.
    pub fn read_block<S: ByteSource>(
        &self,
        big: &BigBlockTable<S>,
        block: i32,
        out: &mut [u8; SMALL_BLOCK_SIZE],
    ) -> Result<()> {
        let (big_block, offset) = self.locate(block)?;
        big.read_in_block(big_block, offset, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(container_blocks: Vec<i32>, container_size: u64) -> SmallBlockTable {
        SmallBlockTable {
            fat: Fat::new(vec![END_OF_CHAIN; 32]),
            container_blocks,
            container_size,
        }
    }

    #[test]
    fn test_locate_translates_into_container_blocks() {
        let small = table(vec![7, 3, 9], 3 * 512);
        assert_eq!(small.locate(0).unwrap(), (7, 0));
        assert_eq!(small.locate(7).unwrap(), (7, 448));
        assert_eq!(small.locate(8).unwrap(), (3, 0));
        assert_eq!(small.locate(17).unwrap(), (9, 64));
        assert!(small.locate(24).is_err());
        assert!(small.locate(-1).is_err());
    }

    #[test]
    fn test_locate_respects_declared_container_size() {
        let small = table(vec![4], 130);
        assert!(small.locate(2).is_ok());
        assert!(small.locate(3).is_err());
    }
}
