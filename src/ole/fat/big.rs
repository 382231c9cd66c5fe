use super::Fat;
use super::cache::CacheWindow;
use crate::common::binary::read_i32_le;
use crate::common::{DocfileError, Result};
use crate::ole::consts::*;
use crate::ole::docfile::OpenOptions;
use crate::ole::header::Header;
use crate::ole::source::ByteSource;
use fixedbitset::FixedBitSet;
use parking_lot::Mutex;
use tracing::{debug, warn};

/// The primary allocation table together with the host byte source it
/// indexes.
///
/// Block `n` lives at host offset `(n + 1) * 512`; the first 512 bytes are
/// the header, which stays resident for the lifetime of the table. Block
/// reads go through a single 4 KiB cache window guarded by a mutex, so the
/// table can be shared by several open streams.
#[derive(Debug)]
pub struct BigBlockTable<S> {
    source: S,
    header_block: Box<[u8; HEADER_SIZE]>,
    header: Header,
    fat: Fat,
    file_len: u64,
    cache: Mutex<CacheWindow>,
}

impl<S: ByteSource> BigBlockTable<S> {
    /// Read the header and assemble the allocation table from the inline
    /// block list plus the extended FAT page chain.
    pub fn load(source: S, options: &OpenOptions) -> Result<Self> {
        let file_len = source.len()?;
        if file_len < MINIMAL_OLEFILE_SIZE as u64 {
            return Err(DocfileError::NotDocfile);
        }

        let mut header_block = Box::new([0u8; HEADER_SIZE]);
        source.read_exact_at(0, header_block.as_mut_slice())?;
        let header = Header::parse(&header_block, options.strict)?;

        let mut table = BigBlockTable {
            source,
            header_block,
            header,
            fat: Fat::default(),
            file_len,
            cache: Mutex::new(CacheWindow::new()),
        };

        let depot = table.collect_depot_blocks(options.strict)?;
        let mut entries = Vec::with_capacity(depot.len() * INDICES_PER_BLOCK);
        let mut block = [0u8; BIG_BLOCK_SIZE];
        for &depot_block in &depot {
            table.read_block(depot_block, &mut block)?;
            for i in 0..INDICES_PER_BLOCK {
                entries.push(read_i32_le(&block, i * 4)?);
            }
        }
        table.fat = Fat::new(entries);
        table.fat.validate()?;
        debug!(
            depot_blocks = depot.len(),
            entries = table.fat.len(),
            "loaded big block allocation table"
        );
        Ok(table)
    }

    /// Gather the block numbers holding the allocation table itself.
    ///
    /// A depot count larger than the pointers actually present is clamped
    /// unless `strict` is set.
    fn collect_depot_blocks(&self, strict: bool) -> Result<Vec<i32>> {
        let file_blocks = self.block_count_in_file();
        let mut declared = self.header.num_fat_blocks as usize;
        if declared > file_blocks {
            if strict {
                return Err(DocfileError::CorruptedFile(format!(
                    "header declares {declared} FAT blocks in a file of {file_blocks} blocks"
                )));
            }
            warn!(declared, file_blocks, "FAT block count exceeds file size, clamping");
            declared = file_blocks;
        }
        let mut depot = Vec::with_capacity(declared);

        for &pointer in self.header.fat_blocks.iter().take(declared) {
            if pointer < 0 {
                return self.depot_mismatch(strict, declared, depot.len(), depot);
            }
            self.check_depot_pointer(pointer)?;
            depot.push(pointer);
        }

        let mut page = self.header.extended_fat_start;
        let mut seen_pages = FixedBitSet::with_capacity(file_blocks);
        let mut pages_read = 0u32;
        let mut buf = [0u8; BIG_BLOCK_SIZE];
        while depot.len() < declared {
            if page < 0 {
                return self.depot_mismatch(strict, declared, depot.len(), depot);
            }
            if page as usize >= file_blocks {
                return Err(DocfileError::CorruptedFile(format!(
                    "extended FAT page {page} beyond end of file"
                )));
            }
            if seen_pages.put(page as usize) {
                return Err(DocfileError::CorruptedFile(format!(
                    "extended FAT page chain loops at block {page}"
                )));
            }
            self.read_block(page, &mut buf)?;
            pages_read += 1;

            let wanted = (declared - depot.len()).min(EXTENDED_FAT_SLOTS);
            let mut pointers = Vec::with_capacity(wanted);
            let mut truncated = false;
            for i in 0..wanted {
                let pointer = read_i32_le(&buf, i * 4)?;
                if pointer < 0 {
                    truncated = true;
                    break;
                }
                self.check_depot_pointer(pointer)?;
                pointers.push(pointer);
            }
            depot.extend(pointers);
            if truncated {
                return self.depot_mismatch(strict, declared, depot.len(), depot);
            }
            page = read_i32_le(&buf, EXTENDED_FAT_SLOTS * 4)?;
        }

        if pages_read != self.header.num_extended_fat_blocks {
            debug!(
                declared = self.header.num_extended_fat_blocks,
                read = pages_read,
                "extended FAT page count differs from header"
            );
        }
        Ok(depot)
    }

    fn depot_mismatch(
        &self,
        strict: bool,
        declared: usize,
        found: usize,
        mut depot: Vec<i32>,
    ) -> Result<Vec<i32>> {
        if strict {
            return Err(DocfileError::CorruptedFile(format!(
                "header declares {declared} FAT blocks but only {found} are present"
            )));
        }
        warn!(declared, found, "FAT block count mismatch, truncating table");
        depot.truncate(found);
        Ok(depot)
    }

    fn check_depot_pointer(&self, pointer: i32) -> Result<()> {
        if pointer as usize >= self.block_count_in_file() {
            return Err(DocfileError::CorruptedFile(format!(
                "FAT block {pointer} beyond end of file"
            )));
        }
        Ok(())
    }

    /// Parsed header
    #[inline]
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// The raw resident header block
    #[inline]
    pub fn header_block(&self) -> &[u8; HEADER_SIZE] {
        &self.header_block
    }

    /// The loaded allocation table
    #[inline]
    pub fn fat(&self) -> &Fat {
        &self.fat
    }

    /// The host byte source
    #[inline]
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Length of the host byte source
    #[inline]
    pub fn file_len(&self) -> u64 {
        self.file_len
    }

    /// Number of (possibly partial) big blocks after the header
    pub fn block_count_in_file(&self) -> usize {
        (self.file_len.saturating_sub(HEADER_SIZE as u64)).div_ceil(BIG_BLOCK_SIZE as u64) as usize
    }

    /// Host offset of big block `block`
    #[inline]
    pub fn block_offset(block: i32) -> u64 {
        (block as u64 + 1) * BIG_BLOCK_SIZE as u64
    }

    /// Read one whole big block through the cache window.
    pub fn read_block(&self, block: i32, out: &mut [u8; BIG_BLOCK_SIZE]) -> Result<()> {
        self.read_in_block(block, 0, out)
    }

    /// Read `out.len()` bytes at `offset` within big block `block`.
    pub fn read_in_block(&self, block: i32, offset: usize, out: &mut [u8]) -> Result<()> {
        if block < 0 || offset + out.len() > BIG_BLOCK_SIZE {
            return Err(DocfileError::CorruptedFile(format!(
                "invalid read of {} bytes at {offset} in block {block}",
                out.len()
            )));
        }
        let host = Self::block_offset(block) + offset as u64;
        self.cache.lock().read(&self.source, host, out)?;
        Ok(())
    }

    /// Read every block of the chain starting at `start` into one buffer.
    pub fn read_chain(&self, start: i32) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        let mut block = [0u8; BIG_BLOCK_SIZE];
        for index in self.fat.chain(start) {
            self.read_block(index?, &mut block)?;
            data.extend_from_slice(&block);
        }
        Ok(data)
    }

    /// Give back the host byte source.
    pub fn into_source(self) -> S {
        self.source
    }
}
