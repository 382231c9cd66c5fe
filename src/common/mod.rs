//! Common types and utilities shared by the container reader and the
//! property-set parser.

// Submodule declarations
pub mod binary;
pub mod error;

// Re-exports for convenience
pub use error::{DocfileError, Result};
