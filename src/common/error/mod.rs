//! Unified error types for the docfile library.

// Submodule declarations
pub mod conversions;
pub mod types;

// Re-exports
pub use types::{DocfileError, Result};
