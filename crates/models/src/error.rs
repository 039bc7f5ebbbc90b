//! Model Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A model error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for model construction and parsing.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Text that does not follow the catalog's version scheme.
    #[display("invalid version: {_0}")]
    InvalidVersion(#[error(not(source))] String),
    /// A checksum digest that is not valid hexadecimal.
    #[display("invalid checksum digest: {_0}")]
    InvalidChecksum(#[error(not(source))] String),
    /// A path that cannot be represented as a URL.
    #[display("path is not valid UTF-8")]
    InvalidPath,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // Parsing the same input again gives the same answer.
        false
    }
}
