//! Archive-level error type.
//!
//! Structural problems with a compound file (bad signature, unsupported
//! dialect, broken allocation tables, a missing root) all surface as a
//! single [`DocfileError`] carrying a descriptive message.
use thiserror::Error;

/// Main error type for Docfile operations.
#[derive(Error, Debug)]
pub enum DocfileError {
    /// IO error from the underlying byte source
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The data does not start with the compound file signature
    #[error("Not a compound document file")]
    NotDocfile,

    /// A header field names a dialect this reader does not handle
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Corrupted or malformed file structure
    #[error("Corrupted file: {0}")]
    CorruptedFile(String),

    /// A named file, directory or stream does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Streams opened from a compound file cannot be written
    #[error("Stream is read-only")]
    ReadOnly,

    /// A property-set store id outside the stored value range
    #[error("Invalid property store id: {0}")]
    InvalidStoreId(u32),

    /// Malformed property set or section header
    #[error("Property set error: {0}")]
    PropertySet(String),
}

/// Result type for Docfile operations.
pub type Result<T> = std::result::Result<T, DocfileError>;
