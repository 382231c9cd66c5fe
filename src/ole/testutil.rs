//! In-memory compound file and property-set images for tests.
//!
//! [`ImageBuilder`] lays out streams the way a writer would: short streams
//! go into the mini stream, long streams get their own big-block chains, and
//! the FAT (plus extended FAT pages when needed) is appended last.

use super::consts::*;

/// Header field offsets patched by tests
pub const HEADER_NUM_FAT_BLOCKS: usize = 0x2C;
pub const HEADER_ROOT_START: usize = 0x30;
pub const HEADER_EXTENDED_FAT_START: usize = 0x44;
pub const HEADER_FAT_ARRAY: usize = 0x4C;

#[derive(Debug, Clone)]
enum Kind {
    Storage,
    Stream(Vec<u8>),
}

#[derive(Debug, Clone)]
struct Node {
    name: String,
    parent: usize,
    kind: Kind,
}

#[derive(Debug, Clone)]
pub struct ImageBuilder {
    nodes: Vec<Node>,
    root_clsid: [u8; 16],
    scatter: bool,
    min_fat_blocks: usize,
}

impl Default for ImageBuilder {
    fn default() -> Self {
        Self {
            nodes: vec![Node {
                name: "Root Entry".to_string(),
                parent: 0,
                kind: Kind::Storage,
            }],
            root_clsid: [0; 16],
            scatter: false,
            min_fat_blocks: 1,
        }
    }
}

impl ImageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create `path` (and any missing parents) as storages.
    pub fn storage(mut self, path: &[&str]) -> Self {
        self.ensure_storage(path);
        self
    }

    /// Add a stream; missing parent storages are created.
    pub fn stream(mut self, path: &[&str], data: &[u8]) -> Self {
        let (name, parents) = path.split_last().expect("stream path must not be empty");
        let parent = self.ensure_storage(parents);
        self.nodes.push(Node {
            name: name.to_string(),
            parent,
            kind: Kind::Stream(data.to_vec()),
        });
        self
    }

    /// Lay big-block chains out in reverse so no two blocks are adjacent in chain order.
    pub fn scattered(mut self) -> Self {
        self.scatter = true;
        self
    }

    /// Reserve at least `count` FAT blocks, spilling into extended FAT pages past 109.
    pub fn min_fat_blocks(mut self, count: usize) -> Self {
        self.min_fat_blocks = count;
        self
    }

    pub fn root_clsid(mut self, clsid: [u8; 16]) -> Self {
        self.root_clsid = clsid;
        self
    }

    fn ensure_storage(&mut self, path: &[&str]) -> usize {
        let mut current = 0;
        for name in path {
            let existing = self.nodes.iter().skip(1).position(|n| {
                n.parent == current && n.name == *name && matches!(n.kind, Kind::Storage)
            });
            current = match existing {
                Some(i) => i + 1,
                None => {
                    self.nodes.push(Node {
                        name: name.to_string(),
                        parent: current,
                        kind: Kind::Storage,
                    });
                    self.nodes.len() - 1
                },
            };
        }
        current
    }

    pub fn build(&self) -> Vec<u8> {
        let mut layout = Layout::default();

        // Per-node (start block, size)
        let mut placement = vec![(END_OF_CHAIN, 0u32); self.nodes.len()];
        let mut mini_data = Vec::new();
        let mut mini_fat: Vec<i32> = Vec::new();
        for (index, node) in self.nodes.iter().enumerate() {
            let Kind::Stream(data) = &node.kind else {
                continue;
            };
            if data.is_empty() {
                continue;
            }
            if data.len() < SMALL_STREAM_CUTOFF as usize {
                let first = mini_fat.len() as i32;
                let count = data.len().div_ceil(SMALL_BLOCK_SIZE);
                for k in 0..count {
                    let next = if k + 1 == count { END_OF_CHAIN } else { first + k as i32 + 1 };
                    mini_fat.push(next);
                }
                mini_data.extend_from_slice(data);
                mini_data.resize(mini_fat.len() * SMALL_BLOCK_SIZE, 0);
                placement[index] = (first, data.len() as u32);
            } else {
                let start = layout.alloc(data, self.scatter);
                placement[index] = (start, data.len() as u32);
            }
        }

        let (mini_fat_start, mini_fat_blocks) = if mini_fat.is_empty() {
            (END_OF_CHAIN, 0)
        } else {
            mini_fat.resize(mini_fat.len().next_multiple_of(INDICES_PER_BLOCK), FREE_BLOCK);
            let bytes: Vec<u8> = mini_fat.iter().flat_map(|v| v.to_le_bytes()).collect();
            (layout.alloc(&bytes, false), bytes.len() / BIG_BLOCK_SIZE)
        };
        placement[0] = (layout.alloc(&mini_data, self.scatter), mini_data.len() as u32);

        let directory = self.directory(&placement);
        let dir_start = layout.alloc(&directory, false);

        let mut image = layout.finish(self.min_fat_blocks);
        let header = &mut image[..HEADER_SIZE];
        put_u32(header, 0x3C, mini_fat_start as u32);
        put_u32(header, 0x40, mini_fat_blocks as u32);
        put_u32(header, HEADER_ROOT_START, dir_start as u32);
        image
    }

    fn directory(&self, placement: &[(i32, u32)]) -> Vec<u8> {
        let count = self.nodes.len().next_multiple_of(BIG_BLOCK_SIZE / DIRENTRY_SIZE);
        let mut out = vec![0u8; count * DIRENTRY_SIZE];
        for (index, node) in self.nodes.iter().enumerate() {
            let children: Vec<usize> = (1..self.nodes.len())
                .filter(|&i| self.nodes[i].parent == index)
                .collect();
            let rec = &mut out[index * DIRENTRY_SIZE..(index + 1) * DIRENTRY_SIZE];
            let kind = match (index, &node.kind) {
                (0, _) => STGTY_ROOT,
                (_, Kind::Storage) => STGTY_STORAGE,
                (_, Kind::Stream(_)) => STGTY_STREAM,
            };
            let next = if index == 0 {
                NO_STREAM
            } else {
                let siblings: Vec<usize> = (1..self.nodes.len())
                    .filter(|&i| self.nodes[i].parent == node.parent)
                    .collect();
                let at = siblings.iter().position(|&i| i == index).unwrap_or(0);
                siblings.get(at + 1).map_or(NO_STREAM, |&i| i as i32)
            };
            let child = children.first().map_or(NO_STREAM, |&i| i as i32);
            write_record(rec, &node.name, kind, NO_STREAM, next, child, placement[index]);
            if index == 0 {
                rec[80..96].copy_from_slice(&self.root_clsid);
            }
        }
        out
    }
}

/// Encode one 128-byte directory record.
pub fn write_record(
    rec: &mut [u8],
    name: &str,
    kind: u8,
    prev: i32,
    next: i32,
    child: i32,
    (start, size): (i32, u32),
) {
    let units: Vec<u16> = name.encode_utf16().collect();
    for (i, unit) in units.iter().take(31).enumerate() {
        rec[i * 2..i * 2 + 2].copy_from_slice(&unit.to_le_bytes());
    }
    let len = (units.len().min(31) as u16 + 1) * 2;
    rec[64..66].copy_from_slice(&len.to_le_bytes());
    rec[66] = kind;
    rec[67] = 1;
    put_u32(rec, 68, prev as u32);
    put_u32(rec, 72, next as u32);
    put_u32(rec, 76, child as u32);
    put_u32(rec, 116, start as u32);
    put_u32(rec, 120, size);
}

pub fn put_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

/// Host offset of directory record `index`, assuming a contiguous directory chain
pub fn record_offset(image: &[u8], index: usize) -> usize {
    let start = i32::from_le_bytes(
        image[HEADER_ROOT_START..HEADER_ROOT_START + 4]
            .try_into()
            .unwrap(),
    );
    (start as usize + 1) * BIG_BLOCK_SIZE + index * DIRENTRY_SIZE
}

#[derive(Debug, Default)]
struct Layout {
    blocks: Vec<[u8; BIG_BLOCK_SIZE]>,
    fat: Vec<i32>,
}

impl Layout {
    fn alloc(&mut self, data: &[u8], scatter: bool) -> i32 {
        let count = data.len().div_ceil(BIG_BLOCK_SIZE);
        if count == 0 {
            return END_OF_CHAIN;
        }
        let base = self.blocks.len();
        self.blocks.resize(base + count, [0u8; BIG_BLOCK_SIZE]);
        self.fat.resize(base + count, FREE_BLOCK);
        let mut order: Vec<usize> = (base..base + count).collect();
        if scatter {
            order.reverse();
        }
        for (k, chunk) in data.chunks(BIG_BLOCK_SIZE).enumerate() {
            self.blocks[order[k]][..chunk.len()].copy_from_slice(chunk);
            self.fat[order[k]] = order.get(k + 1).map_or(END_OF_CHAIN, |&b| b as i32);
        }
        order[0] as i32
    }

    /// Append FAT blocks and extended FAT pages and emit the whole file.
    fn finish(mut self, min_fat_blocks: usize) -> Vec<u8> {
        let data_blocks = self.blocks.len();
        let (mut fat_blocks, mut ext_pages) = (min_fat_blocks.max(1), 0);
        loop {
            let total = data_blocks + fat_blocks + ext_pages;
            let needed_fat = total.div_ceil(INDICES_PER_BLOCK).max(min_fat_blocks);
            let needed_ext = needed_fat
                .saturating_sub(HEADER_FAT_SLOTS)
                .div_ceil(EXTENDED_FAT_SLOTS);
            if needed_fat == fat_blocks && needed_ext == ext_pages {
                break;
            }
            fat_blocks = needed_fat.max(fat_blocks);
            ext_pages = needed_ext.max(ext_pages);
        }

        let fat_first = data_blocks;
        let ext_first = data_blocks + fat_blocks;
        self.fat.resize(fat_blocks * INDICES_PER_BLOCK, FREE_BLOCK);
        for b in fat_first..ext_first {
            self.fat[b] = SPECIAL_BLOCK;
        }
        for b in ext_first..ext_first + ext_pages {
            self.fat[b] = EXTENSION_BLOCK;
        }
        for chunk in self.fat.chunks(INDICES_PER_BLOCK) {
            let mut block = [0u8; BIG_BLOCK_SIZE];
            for (i, v) in chunk.iter().enumerate() {
                put_u32(&mut block, i * 4, *v as u32);
            }
            self.blocks.push(block);
        }

        let fat_pointers: Vec<i32> = (fat_first..ext_first).map(|b| b as i32).collect();
        let spilled: Vec<i32> = fat_pointers.iter().skip(HEADER_FAT_SLOTS).copied().collect();
        for (page, pointers) in spilled.chunks(EXTENDED_FAT_SLOTS).enumerate() {
            let mut block = [0u8; BIG_BLOCK_SIZE];
            for i in 0..EXTENDED_FAT_SLOTS {
                let v = pointers.get(i).copied().unwrap_or(FREE_BLOCK);
                put_u32(&mut block, i * 4, v as u32);
            }
            let next = if page + 1 < ext_pages {
                (ext_first + page + 1) as i32
            } else {
                END_OF_CHAIN
            };
            put_u32(&mut block, EXTENDED_FAT_SLOTS * 4, next as u32);
            self.blocks.push(block);
        }

        let mut header = [0u8; HEADER_SIZE];
        header[..8].copy_from_slice(MAGIC);
        header[0x18..0x1A].copy_from_slice(&0x3Eu16.to_le_bytes());
        header[0x1A..0x1C].copy_from_slice(&3u16.to_le_bytes());
        header[0x1C..0x1E].copy_from_slice(&BYTE_ORDER_LE.to_le_bytes());
        header[0x1E..0x20].copy_from_slice(&BIG_BLOCK_SHIFT.to_le_bytes());
        header[0x20..0x22].copy_from_slice(&SMALL_BLOCK_SHIFT.to_le_bytes());
        put_u32(&mut header, HEADER_NUM_FAT_BLOCKS, fat_blocks as u32);
        put_u32(&mut header, 0x38, SMALL_STREAM_CUTOFF);
        let ext_start = if ext_pages > 0 { ext_first as i32 } else { END_OF_CHAIN };
        put_u32(&mut header, HEADER_EXTENDED_FAT_START, ext_start as u32);
        put_u32(&mut header, 0x48, ext_pages as u32);
        for slot in 0..HEADER_FAT_SLOTS {
            let v = fat_pointers.get(slot).copied().unwrap_or(FREE_BLOCK);
            put_u32(&mut header, HEADER_FAT_ARRAY + slot * 4, v as u32);
        }

        let mut image = header.to_vec();
        for block in &self.blocks {
            image.extend_from_slice(block);
        }
        image
    }
}

/// A typed property value: 4-byte type header followed by `payload`
pub fn typed(vt: u16, payload: &[u8]) -> Vec<u8> {
    let mut out = (vt as u32).to_le_bytes().to_vec();
    out.extend_from_slice(payload);
    out.resize(out.len().next_multiple_of(4), 0);
    out
}

/// Length-prefixed byte string payload (no type header)
pub fn counted(bytes: &[u8]) -> Vec<u8> {
    let mut out = (bytes.len() as u32).to_le_bytes().to_vec();
    out.extend_from_slice(bytes);
    out
}

pub fn lpstr(bytes: &[u8]) -> Vec<u8> {
    typed(VT_LPSTR, &counted(bytes))
}

pub fn lpwstr(text: &str) -> Vec<u8> {
    let units: Vec<u16> = text.encode_utf16().chain(std::iter::once(0)).collect();
    let mut payload = (units.len() as u32).to_le_bytes().to_vec();
    payload.extend(units.iter().flat_map(|u| u.to_le_bytes()));
    typed(VT_LPWSTR, &payload)
}

pub fn i2(value: i16) -> Vec<u8> {
    typed(VT_I2, &value.to_le_bytes())
}

pub fn i4(value: i32) -> Vec<u8> {
    typed(VT_I4, &value.to_le_bytes())
}

pub fn filetime(ticks: u64) -> Vec<u8> {
    typed(VT_FILETIME, &ticks.to_le_bytes())
}

/// Dictionary value (no type header) with names in a single-byte codepage
pub fn dictionary(entries: &[(u32, &str)]) -> Vec<u8> {
    let mut out = (entries.len() as u32).to_le_bytes().to_vec();
    for (id, name) in entries {
        out.extend_from_slice(&id.to_le_bytes());
        out.extend_from_slice(&(name.len() as u32 + 1).to_le_bytes());
        out.extend_from_slice(name.as_bytes());
        out.push(0);
    }
    out.resize(out.len().next_multiple_of(4), 0);
    out
}

/// One section for [`property_set`]
#[derive(Debug, Clone)]
pub struct SectionImage {
    pub format_id: [u8; 16],
    pub properties: Vec<(u32, Vec<u8>)>,
    /// Property count written to the header instead of the real one
    pub declared_count: Option<u32>,
}

impl SectionImage {
    pub fn new(format_id: [u8; 16]) -> Self {
        Self {
            format_id,
            properties: Vec::new(),
            declared_count: None,
        }
    }

    pub fn property(mut self, id: u32, value: Vec<u8>) -> Self {
        self.properties.push((id, value));
        self
    }

    pub fn declared_count(mut self, count: u32) -> Self {
        self.declared_count = Some(count);
        self
    }

    fn encode(&self) -> Vec<u8> {
        let table_len = 8 + self.properties.len() * 8;
        let mut values = Vec::new();
        let mut table = Vec::new();
        for (id, value) in &self.properties {
            table.extend_from_slice(&id.to_le_bytes());
            table.extend_from_slice(&((table_len + values.len()) as u32).to_le_bytes());
            values.extend_from_slice(value);
        }
        let size = table_len + values.len();
        let count = self.declared_count.unwrap_or(self.properties.len() as u32);
        let mut out = (size as u32).to_le_bytes().to_vec();
        out.extend_from_slice(&count.to_le_bytes());
        out.extend_from_slice(&table);
        out.extend_from_slice(&values);
        out
    }
}

/// Encode a property-set stream
pub fn property_set(sections: &[SectionImage]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&BYTE_ORDER_LE.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0x0002_0006u32.to_le_bytes());
    out.extend_from_slice(&[0u8; 16]);
    out.extend_from_slice(&(sections.len() as u32).to_le_bytes());

    let encoded: Vec<Vec<u8>> = sections.iter().map(SectionImage::encode).collect();
    let mut offset = 0x1C + sections.len() * 20;
    for (section, bytes) in sections.iter().zip(&encoded) {
        out.extend_from_slice(&section.format_id);
        out.extend_from_slice(&(offset as u32).to_le_bytes());
        offset += bytes.len();
    }
    for bytes in &encoded {
        out.extend_from_slice(bytes);
    }
    out
}
