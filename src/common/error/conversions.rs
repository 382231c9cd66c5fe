//! Error conversion implementations.

use super::types::DocfileError;
use crate::common::binary::BinaryError;

impl From<BinaryError> for DocfileError {
    fn from(err: BinaryError) -> Self {
        DocfileError::CorruptedFile(err.to_string())
    }
}

impl From<DocfileError> for std::io::Error {
    fn from(err: DocfileError) -> Self {
        match err {
            DocfileError::Io(e) => e,
            DocfileError::ReadOnly => std::io::Error::new(std::io::ErrorKind::Unsupported, err),
            DocfileError::NotFound(_) => std::io::Error::new(std::io::ErrorKind::NotFound, err),
            other => std::io::Error::new(std::io::ErrorKind::InvalidData, other),
        }
    }
}
