//! Error types for the storage substrate.

use thiserror::Error;

/// Errors raised by the store, its transactions, and its persistence log.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An i/o failure from the persistence log.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A secondary index with this name is already registered.
    #[error("index already registered: {0}")]
    IndexExists(String),

    /// No secondary index is registered under this name.
    #[error("unknown index: {0}")]
    UnknownIndex(String),

    /// An intersection query was issued against a non-spatial index.
    #[error("index is not spatial: {0}")]
    NotSpatial(String),

    /// A key pattern did not contain exactly one `*` wildcard.
    #[error("invalid key pattern: {0}")]
    InvalidPattern(String),

    /// A write operation was attempted inside a read transaction.
    #[error("transaction is read-only")]
    ReadOnly,

    /// The persistence log could not be decoded.
    #[error("persistence log corrupted: {0}")]
    Corrupted(String),
}

/// Result alias for substrate operations.
pub type Result<T, E = StorageError> = std::result::Result<T, E>;
