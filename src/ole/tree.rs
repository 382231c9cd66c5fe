//! Directory tree reconstruction.
//!
//! On disk the directory is a flat array of 128-byte records linked by
//! `prev`/`next`/`child` indices. Real documents contain cycles and dangling
//! links in these pointers, so the builder walks them with a per-record
//! "touched" bitmap: a record is visited at most once, a repeat visit is a
//! silent no-op, and records with bad names or bad indices are skipped.

use super::consts::*;
use super::docfile::OpenOptions;
use super::entry::{RawDirectoryEntry, format_clsid};
use crate::common::{DocfileError, Result};
use fixedbitset::FixedBitSet;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Location and identity of one directory node's data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Entry {
    /// First block of the node's stream (big or small block space)
    pub first_block: i32,
    /// Stream size in bytes
    pub size: u32,
    pub clsid: [u8; 16],
}

impl Entry {
    fn from_raw(raw: &RawDirectoryEntry) -> Self {
        Entry {
            first_block: raw.start_block(),
            size: raw.size(),
            clsid: raw.clsid(),
        }
    }

    /// Whether the stream lives in the small-block space
    #[inline]
    pub fn is_short(&self) -> bool {
        self.size < SMALL_STREAM_CUTOFF
    }
}

/// A stream inside a [`Directory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    name: String,
    entry: Entry,
}

impl File {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    /// Stream size in bytes
    #[inline]
    pub fn size(&self) -> u32 {
        self.entry.size
    }
}

/// A storage node; children are kept in maps ordered by case-folded name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directory {
    name: String,
    entry: Entry,
    files: BTreeMap<String, File>,
    directories: BTreeMap<String, Directory>,
}

#[inline]
fn fold(name: &str) -> String {
    name.to_lowercase()
}

impl Directory {
    fn new(name: String, entry: Entry) -> Self {
        Directory {
            name,
            entry,
            ..Default::default()
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    #[inline]
    pub fn clsid(&self) -> &[u8; 16] {
        &self.entry.clsid
    }

    /// CLSID formatted as a GUID string, empty when unset
    pub fn clsid_string(&self) -> String {
        format_clsid(&self.entry.clsid)
    }

    /// Case-insensitive lookup of a child stream
    pub fn find_file(&self, name: &str) -> Option<&File> {
        self.files.get(&fold(name))
    }

    /// Case-insensitive lookup of a child storage
    pub fn find_directory(&self, name: &str) -> Option<&Directory> {
        self.directories.get(&fold(name))
    }

    /// Names of the child streams, ordered case-insensitively
    pub fn file_names(&self) -> impl Iterator<Item = &str> {
        self.files.values().map(File::name)
    }

    /// Names of the child storages, ordered case-insensitively
    pub fn directory_names(&self) -> impl Iterator<Item = &str> {
        self.directories.values().map(Directory::name)
    }

    pub fn files(&self) -> impl Iterator<Item = &File> {
        self.files.values()
    }

    pub fn directories(&self) -> impl Iterator<Item = &Directory> {
        self.directories.values()
    }

    /// Insert a stream; an existing child with the same folded name is replaced.
    fn insert_file(&mut self, file: File) {
        if self.files.insert(fold(&file.name), file).is_some() {
            debug!(storage = %self.name, "duplicate stream name replaced");
        }
    }

    fn insert_directory(&mut self, dir: Directory) {
        if self.directories.insert(fold(&dir.name), dir).is_some() {
            debug!(storage = %self.name, "duplicate storage name replaced");
        }
    }
}

/// Rebuild the directory tree from the raw record array.
///
/// Fails only when no record is flagged as the root.
pub(crate) fn build_tree(records: &[u8], options: &OpenOptions) -> Result<Directory> {
    let mut builder = TreeBuilder {
        records,
        count: records.len() / DIRENTRY_SIZE,
        touched: FixedBitSet::with_capacity(records.len() / DIRENTRY_SIZE),
        max_depth: options.max_depth,
    };
    builder.build()
}

struct TreeBuilder<'a> {
    records: &'a [u8],
    count: usize,
    touched: FixedBitSet,
    max_depth: usize,
}

impl TreeBuilder<'_> {
    fn record(&self, index: usize) -> Option<RawDirectoryEntry> {
        let offset = index * DIRENTRY_SIZE;
        RawDirectoryEntry::parse(self.records.get(offset..offset + DIRENTRY_SIZE)?)
    }

    fn build(&mut self) -> Result<Directory> {
        let mut root_index = None;
        for index in 0..self.count {
            if self.record(index).is_some_and(|r| r.is_root()) {
                if root_index.is_none() {
                    root_index = Some(index);
                } else {
                    warn!(index, "ignoring additional root-flagged directory record");
                }
            }
        }
        let root_index = root_index.ok_or_else(|| {
            DocfileError::CorruptedFile("no root directory entry".to_string())
        })?;
        let raw = self.record(root_index).ok_or_else(|| {
            DocfileError::CorruptedFile("unreadable root directory entry".to_string())
        })?;

        self.touched.insert(root_index);
        let mut root = Directory::new(raw.name().unwrap_or_default(), Entry::from_raw(&raw));
        self.populate(&mut root, raw.child(), 0);
        debug!(
            records = self.count,
            visited = self.touched.count_ones(..),
            "rebuilt directory tree"
        );
        Ok(root)
    }

    /// Add the sibling set reachable from `start` to `dir`.
    fn populate(&mut self, dir: &mut Directory, start: i32, depth: usize) {
        let mut pending = vec![start];
        while let Some(index) = pending.pop() {
            if index == NO_STREAM {
                continue;
            }
            if index < 0 || index as usize >= self.count {
                warn!(index, storage = %dir.name, "directory link to nonexistent record");
                continue;
            }
            let index = index as usize;
            if self.touched.put(index) {
                debug!(index, "directory record already visited, skipping");
                continue;
            }
            let Some(raw) = self.record(index) else {
                continue;
            };
            // Child subtree first, then prev, then next
            pending.push(raw.next());
            pending.push(raw.prev());

            let Some(name) = raw.name() else {
                warn!(index, "skipping directory record with invalid name length");
                continue;
            };
            match raw.entry_type() {
                STGTY_STREAM => dir.insert_file(File {
                    name,
                    entry: Entry::from_raw(&raw),
                }),
                STGTY_STORAGE if depth < self.max_depth => {
                    let mut sub = Directory::new(name, Entry::from_raw(&raw));
                    self.populate(&mut sub, raw.child(), depth + 1);
                    dir.insert_directory(sub);
                },
                STGTY_STORAGE => {
                    warn!(index, depth, "storage nested too deeply, skipping");
                },
                other => {
                    debug!(index, entry_type = other, "skipping directory record");
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Rec {
        name: &'static str,
        kind: u8,
        prev: i32,
        next: i32,
        child: i32,
    }

    fn rec(name: &'static str, kind: u8, prev: i32, next: i32, child: i32) -> Rec {
        Rec {
            name,
            kind,
            prev,
            next,
            child,
        }
    }

    fn encode(records: &[Rec]) -> Vec<u8> {
        let mut out = Vec::new();
        for r in records {
            let mut data = [0u8; DIRENTRY_SIZE];
            let units: Vec<u16> = r.name.encode_utf16().collect();
            for (i, unit) in units.iter().enumerate() {
                data[i * 2..i * 2 + 2].copy_from_slice(&unit.to_le_bytes());
            }
            let len = if r.name.is_empty() {
                0
            } else {
                (units.len() as u16 + 1) * 2
            };
            data[64..66].copy_from_slice(&len.to_le_bytes());
            data[66] = r.kind;
            data[68..72].copy_from_slice(&r.prev.to_le_bytes());
            data[72..76].copy_from_slice(&r.next.to_le_bytes());
            data[76..80].copy_from_slice(&r.child.to_le_bytes());
            data[116..120].copy_from_slice(&END_OF_CHAIN.to_le_bytes());
            out.extend_from_slice(&data);
        }
        out
    }

    fn build(records: &[Rec]) -> Result<Directory> {
        build_tree(&encode(records), &OpenOptions::default())
    }

    #[test]
    fn test_basic_tree() {
        let root = build(&[
            rec("Root Entry", STGTY_ROOT, -1, -1, 1),
            rec("Beta", STGTY_STREAM, 2, 3, -1),
            rec("alpha", STGTY_STREAM, -1, -1, -1),
            rec("Objects", STGTY_STORAGE, -1, -1, 4),
            rec("Inner", STGTY_STREAM, -1, -1, -1),
        ])
        .unwrap();
        assert_eq!(root.name(), "Root Entry");
        assert_eq!(root.file_names().collect::<Vec<_>>(), vec!["alpha", "Beta"]);
        assert_eq!(root.directory_names().collect::<Vec<_>>(), vec!["Objects"]);
        assert!(root.find_file("BETA").is_some());
        let objects = root.find_directory("objects").unwrap();
        assert!(objects.find_file("inner").is_some());
        assert!(root.find_file("Inner").is_none());
    }

    #[test]
    fn test_root_found_by_type_not_position() {
        let root = build(&[
            rec("Stream", STGTY_STREAM, -1, -1, -1),
            rec("Root Entry", STGTY_ROOT, -1, -1, 0),
        ])
        .unwrap();
        assert!(root.find_file("stream").is_some());
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let err = build(&[rec("Stream", STGTY_STREAM, -1, -1, -1)]).unwrap_err();
        assert!(matches!(err, DocfileError::CorruptedFile(_)));
    }

    #[test]
    fn test_sibling_cycle_terminates() {
        let root = build(&[
            rec("Root Entry", STGTY_ROOT, -1, -1, 1),
            rec("A", STGTY_STREAM, -1, 2, -1),
            rec("B", STGTY_STREAM, -1, 1, -1),
        ])
        .unwrap();
        assert_eq!(root.file_names().collect::<Vec<_>>(), vec!["A", "B"]);
    }

    #[test]
    fn test_child_pointing_back_to_root() {
        let root = build(&[
            rec("Root Entry", STGTY_ROOT, -1, -1, 1),
            rec("Storage", STGTY_STORAGE, -1, -1, 0),
        ])
        .unwrap();
        let storage = root.find_directory("storage").unwrap();
        assert_eq!(storage.files().count(), 0);
    }

    #[test]
    fn test_invalid_records_skipped() {
        let root = build(&[
            rec("Root Entry", STGTY_ROOT, -1, -1, 1),
            rec("", STGTY_STREAM, 99, 2, -1),
            rec("Good", STGTY_STREAM, -1, -1, -1),
        ])
        .unwrap();
        assert_eq!(root.file_names().collect::<Vec<_>>(), vec!["Good"]);
    }

    #[test]
    fn test_duplicate_names_last_write_wins() {
        let root = build(&[
            rec("Root Entry", STGTY_ROOT, -1, -1, 1),
            rec("Data", STGTY_STREAM, -1, 2, -1),
            rec("DATA", STGTY_STREAM, -1, -1, -1),
        ])
        .unwrap();
        assert_eq!(root.file_names().collect::<Vec<_>>(), vec!["DATA"]);
    }

    #[test]
    fn test_depth_limit() {
        let options = OpenOptions::new().with_max_depth(1);
        let records = encode(&[
            rec("Root Entry", STGTY_ROOT, -1, -1, 1),
            rec("L1", STGTY_STORAGE, -1, -1, 2),
            rec("L2", STGTY_STORAGE, -1, -1, 3),
            rec("Leaf", STGTY_STREAM, -1, -1, -1),
        ]);
        let root = build_tree(&records, &options).unwrap();
        let l1 = root.find_directory("L1").unwrap();
        assert!(l1.find_directory("L2").is_none());
    }
}
