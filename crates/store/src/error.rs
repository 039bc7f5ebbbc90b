//! Store Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.
//!
//! Every transaction-scoped failure rolls back the whole enclosing
//! transaction, so none of these ever describe a partially applied write.

use derive_more::{Display, Error};

/// A store error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;

// SQLite primary result codes (the low byte of extended codes).
const SQLITE_BUSY: i64 = 5;
const SQLITE_LOCKED: i64 = 6;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The store has not been opened yet, or has already been closed.
    #[display("store is not open")]
    NotOpen,
    /// The store file lock, the writer lock or a pooled connection could not
    /// be acquired within the configured window.
    #[display("timed out waiting for a store lock")]
    LockTimeout,
    /// The operation was cancelled before it acquired the writer lock.
    #[display("operation cancelled")]
    Cancelled,
    /// The storage engine itself failed (I/O, disk full, corruption).
    #[display("storage engine failure")]
    EngineFailure,
    /// Stored bytes (or a digest) could not be decoded.
    #[display("could not decode {_0}")]
    DecodeFailure(#[error(not(source))] &'static str),
    /// A value could not be encoded for storage.
    #[display("could not encode {_0}")]
    EncodeFailure(#[error(not(source))] &'static str),
    /// The import pipeline rejected a manifest.
    #[display("manifest rejected")]
    ManifestFailure,
    /// A write was attempted through a read-only transaction.
    #[display("transaction is read-only")]
    ReadOnly,
    /// A transaction handle was used outside of the scope that opened it.
    #[display("no active transaction")]
    NoTransaction,
    /// The storage configuration was rejected.
    #[display("invalid storage configuration")]
    InvalidConfig,
    /// The primary key cannot be stored.
    #[display("invalid key: {_0:?}")]
    InvalidKey(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::LockTimeout)
    }

    /// Convert an engine error into a store error, keeping the original as a
    /// child in the error tree.
    #[track_caller]
    pub(crate) fn engine(err: sqlx::Error) -> Error {
        let kind = Self::classify(&err);
        exn::Exn::from(err).raise(kind)
    }

    fn classify(err: &sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => Self::LockTimeout,
            sqlx::Error::PoolClosed => Self::NotOpen,
            sqlx::Error::Database(db) => {
                let code = db.code().and_then(|c| c.parse::<i64>().ok()).map(|c| c & 0xff);
                match code {
                    Some(SQLITE_BUSY | SQLITE_LOCKED) => Self::LockTimeout,
                    _ => Self::EngineFailure,
                }
            },
            _ => Self::EngineFailure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_errors_are_classified() {
        assert_eq!(ErrorKind::classify(&sqlx::Error::PoolTimedOut), ErrorKind::LockTimeout);
        assert_eq!(ErrorKind::classify(&sqlx::Error::PoolClosed), ErrorKind::NotOpen);
        assert_eq!(ErrorKind::classify(&sqlx::Error::RowNotFound), ErrorKind::EngineFailure);
    }

    #[test]
    fn test_only_lock_timeouts_are_retryable() {
        assert!(ErrorKind::LockTimeout.is_retryable());
        assert!(!ErrorKind::EngineFailure.is_retryable());
        assert!(!ErrorKind::DecodeFailure("release").is_retryable());
    }
}
