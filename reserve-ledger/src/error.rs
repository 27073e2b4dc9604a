//! Error types for the settlement ledger

use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Invariant violation (cursor ordering, pool arithmetic, etc.)
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Exchange not found at the given index
    #[error("Exchange not found at index {0}")]
    ExchangeNotFound(u64),

    /// Rejected exchange status transition
    #[error("Invalid status transition: {0}")]
    InvalidStatusTransition(String),

    /// Arithmetic overflow in pool or payout accounting
    #[error("Arithmetic overflow: {0}")]
    ArithmeticOverflow(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}
