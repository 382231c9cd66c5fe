//! Compound File Binary ("docfile") reader.
//!
//! Loading runs in a fixed order: the header and big-block allocation table
//! come first, then the directory records are read and rebuilt into a tree,
//! and only then is the small-block table loaded (its data lives in the root
//! entry's stream). After that the [`Docfile`] is immutable; any number of
//! [`StreamReader`]s may borrow it at once.
//!
//! Property-set streams (`\x05SummaryInformation` and friends) are decoded by
//! [`propset`], with [`OleMetadata`] as a convenience view over the two
//! standard ones.

/// Constants for the compound file format
pub mod consts;

/// Byte sources the reader can sit on
pub mod source;

/// File header parsing and signature detection
pub mod header;

/// Big- and small-block allocation tables
pub mod fat;

/// Raw 128-byte directory records
pub mod entry;

/// Directory tree reconstruction
pub mod tree;

/// Stream readers
pub mod stream;

/// The docfile façade
pub mod docfile;

/// Windows codepage decoding
pub mod codepage;

/// Property-set parsing
pub mod propset;

/// SummaryInformation / DocumentSummaryInformation metadata
mod metadata;

#[cfg(test)]
mod testutil;


pub use docfile::{Docfile, OpenOptions, StreamOwningDocfile};
pub use fat::{BigBlockTable, Fat, SmallBlockTable};
pub use header::{has_signature, is_ole_file};
pub use metadata::OleMetadata;
pub use propset::{OlePropertySet, PropertySetOptions, Section, StoreId, Value, VariantType};
pub use source::{ByteSource, ReaderSource};
pub use stream::StreamReader;
pub use tree::{Directory, Entry, File};
