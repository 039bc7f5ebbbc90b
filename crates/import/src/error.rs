//! Import Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// An import error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for import operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("could not read manifest {}", _0.display())]
    Io(#[error(not(source))] PathBuf),
    #[display("manifest {} does not match the schema", _0.display())]
    Parse(#[error(not(source))] PathBuf),
    #[display("invalid value for manifest field `{field}`")]
    Manifest { field: &'static str },
    #[display("could not decode manifest field `{field}`")]
    Decode { field: &'static str },
    #[display("catalog store rejected the import")]
    Store,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}
