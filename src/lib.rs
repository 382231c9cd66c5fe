//! Docfile - a reader for OLE2 Compound File Binary documents
//!
//! Compound files ("docfiles") are the container behind legacy Microsoft
//! Office formats (.doc, .xls, .ppt), MSI packages and many other Windows
//! formats. This crate opens such a container read-only, rebuilds its
//! directory tree and exposes each embedded stream as a seekable reader.
//!
//! # Features
//!
//! - **Tolerant reader**: directory cycles, dangling links and allocation
//!   table count mismatches are skipped or clamped the way Office does,
//!   with an opt-in strict mode
//! - **Random access**: large streams are mapped to contiguous host runs once
//!   and read without walking the allocation table again
//! - **Property sets**: decode `\x05SummaryInformation`-style streams into
//!   typed values, with a ready-made [`OleMetadata`](ole::OleMetadata) view
//! - **Pluggable byte sources**: in-memory buffers, files or any `Read + Seek`
//!
//! # Example - Listing and reading streams
//!
//! ```no_run
//! use docfile::ole::Docfile;
//! use std::io::Read;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let doc = Docfile::open(std::fs::File::open("document.doc")?)?;
//!
//! for path in doc.list_streams() {
//!     println!("{}", path.join("/"));
//! }
//!
//! let root = doc.root();
//! if let Some(file) = doc.find_file(root, "WordDocument") {
//!     let mut stream = doc.open_ole_file(file)?;
//!     let mut fib = Vec::new();
//!     stream.read_to_end(&mut fib)?;
//!     println!("WordDocument is {} bytes", fib.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Example - Document metadata
//!
//! ```no_run
//! use docfile::ole::StreamOwningDocfile;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let doc = StreamOwningDocfile::open_path("spreadsheet.xls")?;
//! let metadata = doc.metadata()?;
//! println!("title: {:?}, author: {:?}", metadata.title, metadata.author);
//! # Ok(())
//! # }
//! ```

/// Common types and utilities shared across the crate
pub mod common;

/// OLE2 compound file reader and property-set parser
pub mod ole;

// Re-export commonly used types for convenience
pub use common::{DocfileError, Result};
pub use ole::{Docfile, OlePropertySet, OpenOptions, StreamOwningDocfile, StreamReader};
