use super::consts::*;
use super::fat::{BigBlockTable, SmallBlockTable};
use super::propset::OlePropertySet;
use super::source::ByteSource;
use super::stream::StreamReader;
use super::tree::{self, Directory, File};
use crate::common::{DocfileError, Result};
use std::path::Path;
use tracing::debug;

/// Options controlling how tolerant [`Docfile::open_with_options`] is.
///
/// # Examples
///
/// ```rust
/// use docfile::ole::OpenOptions;
///
/// let options = OpenOptions::new().with_strict(true).with_max_depth(16);
/// assert!(options.strict);
/// ```
#[derive(Debug, Clone)]
pub struct OpenOptions {
    /// Reject FAT/depot count mismatches and unexpected header versions
    /// instead of clamping past them
    pub strict: bool,
    /// Deepest storage nesting the tree builder descends into
    pub max_depth: usize,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            strict: false,
            max_depth: 64,
        }
    }
}

impl OpenOptions {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    #[inline]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

/// A compound file opened for reading.
///
/// The docfile owns its byte source `S`; pass a reference (`&[u8]`,
/// `&File`) to borrow one instead. Streams opened from it borrow the
/// allocation tables and cannot outlive it.
///
/// # Example
///
/// ```no_run
/// use docfile::ole::Docfile;
/// use std::io::Read;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let doc = Docfile::open(std::fs::File::open("report.doc")?)?;
/// let root = doc.root();
/// for name in doc.files(root) {
///     println!("{name}");
/// }
/// if let Some(file) = doc.find_file(root, "WordDocument") {
///     let mut stream = doc.open_ole_file(file)?;
///     let mut fib = [0u8; 32];
///     stream.read_exact(&mut fib)?;
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Docfile<S> {
    big: BigBlockTable<S>,
    small: SmallBlockTable,
    root: Directory,
}

/// A docfile that owns a type-erased byte source.
pub type StreamOwningDocfile = Docfile<Box<dyn ByteSource + Send + Sync>>;

impl StreamOwningDocfile {
    /// Open a compound file from a path, taking ownership of the file handle.
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Docfile::open(Box::new(file) as Box<dyn ByteSource + Send + Sync>)
    }
}

impl<S: ByteSource> Docfile<S> {
    /// Open and parse a compound file with default (lenient) options.
    pub fn open(source: S) -> Result<Self> {
        Self::open_with_options(source, &OpenOptions::default())
    }

    /// Open and parse a compound file.
    ///
    /// Loading is two-phase: the big-block table comes first, then the
    /// directory tree, and only then the small-block table, whose data lives
    /// in the stream named by the root entry.
    pub fn open_with_options(source: S, options: &OpenOptions) -> Result<Self> {
        let big = BigBlockTable::load(source, options)?;

        let dir_start = big.header().root_start_block;
        let dir_blocks = big.fat().length_in_blocks(dir_start)?;
        let records = big.read_chain(dir_start)?;
        debug_assert_eq!(records.len(), dir_blocks * BIG_BLOCK_SIZE);
        let root = tree::build_tree(&records, options)?;

        let mut small = SmallBlockTable::new();
        small.load_fat(&big, big.header().small_depot_start, root.entry())?;

        debug!(
            directory_blocks = dir_blocks,
            file_len = big.file_len(),
            "opened compound file"
        );
        Ok(Docfile { big, small, root })
    }

    /// The root storage
    #[inline]
    pub fn root(&self) -> &Directory {
        &self.root
    }

    /// Name of the root entry (usually "Root Entry")
    pub fn root_name(&self) -> &str {
        self.root.name()
    }

    /// Length of the underlying byte source
    #[inline]
    pub fn file_size(&self) -> u64 {
        self.big.file_len()
    }

    /// Case-insensitive lookup of a stream directly inside `dir`
    pub fn find_file<'d>(&self, dir: &'d Directory, name: &str) -> Option<&'d File> {
        dir.find_file(name)
    }

    /// Case-insensitive lookup of a storage directly inside `dir`
    pub fn find_directory<'d>(&self, dir: &'d Directory, name: &str) -> Option<&'d Directory> {
        dir.find_directory(name)
    }

    /// Names of the streams directly inside `dir`
    pub fn files<'d>(&self, dir: &'d Directory) -> Vec<&'d str> {
        dir.file_names().collect()
    }

    /// Names of the storages directly inside `dir`
    pub fn directories<'d>(&self, dir: &'d Directory) -> Vec<&'d str> {
        dir.directory_names().collect()
    }

    /// CLSID of a storage
    pub fn clsid<'d>(&self, dir: &'d Directory) -> &'d [u8; 16] {
        dir.clsid()
    }

    /// Open a stream for reading, choosing the small- or big-block reader by size.
    pub fn open_ole_file(&self, file: &File) -> Result<StreamReader<'_, S>> {
        let entry = file.entry();
        if entry.is_short() {
            StreamReader::short(&self.big, &self.small, entry)
        } else {
            StreamReader::long(&self.big, entry)
        }
    }

    /// Resolve a path of storage names ending in a stream name.
    pub fn find_path(&self, path: &[&str]) -> Option<&File> {
        let (last, dirs) = path.split_last()?;
        let mut dir = &self.root;
        for name in dirs {
            dir = dir.find_directory(name)?;
        }
        dir.find_file(last)
    }

    /// Read a whole stream by path.
    pub fn open_stream(&self, path: &[&str]) -> Result<Vec<u8>> {
        let file = self
            .find_path(path)
            .ok_or_else(|| DocfileError::NotFound(path.join("/")))?;
        Ok(self.open_ole_file(file)?.read_to_vec()?)
    }

    /// Check whether a stream or storage exists at `path`
    pub fn exists(&self, path: &[&str]) -> bool {
        let Some((last, dirs)) = path.split_last() else {
            return true;
        };
        let mut dir = &self.root;
        for name in dirs {
            match dir.find_directory(name) {
                Some(d) => dir = d,
                None => return false,
            }
        }
        dir.find_file(last).is_some() || dir.find_directory(last).is_some()
    }

    /// Every stream path in the file, depth first, a storage's streams before its sub-storages
    pub fn list_streams(&self) -> Vec<Vec<String>> {
        fn walk(dir: &Directory, prefix: &mut Vec<String>, out: &mut Vec<Vec<String>>) {
            for file in dir.files() {
                let mut path = prefix.clone();
                path.push(file.name().to_string());
                out.push(path);
            }
            for sub in dir.directories() {
                prefix.push(sub.name().to_string());
                walk(sub, prefix, out);
                prefix.pop();
            }
        }
        let mut out = Vec::new();
        walk(&self.root, &mut Vec::new(), &mut out);
        out
    }

    /// Parse the property-set stream at `path`.
    pub fn property_set(&self, path: &[&str]) -> Result<OlePropertySet> {
        let data = self.open_stream(path)?;
        OlePropertySet::parse(&data)
    }

    /// The big-block table (and through it the byte source)
    #[inline]
    pub fn big_block_table(&self) -> &BigBlockTable<S> {
        &self.big
    }

    /// The small-block table
    #[inline]
    pub fn small_block_table(&self) -> &SmallBlockTable {
        &self.small
    }

    /// Close the docfile and give back its byte source.
    pub fn into_source(self) -> S {
        self.big.into_source()
    }
}
