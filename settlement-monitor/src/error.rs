//! Error types for the settlement monitor

use thiserror::Error;

/// Result type for monitor operations
pub type Result<T> = std::result::Result<T, Error>;

/// Monitor errors
///
/// Everything except `Halted` describes a failure inside a single block's
/// processing. `Halted` is the distinguished critical-exit signal: the
/// failure has already been persisted (diagnostic record + poison-block
/// cursor) and the supervising caller is expected to terminate the process.
#[derive(Error, Debug)]
pub enum Error {
    /// Ledger store error
    #[error("Ledger error: {0}")]
    Ledger(#[from] reserve_ledger::Error),

    /// Chain client error (RPC, decoding, submission)
    #[error("Chain error: {0}")]
    Chain(String),

    /// Token issuance of zero; pricing is undefined
    #[error("Total issuance is zero")]
    ZeroIssuance,

    /// Raw chain amount outside the representable decimal range
    #[error("Token amount out of range: {0}")]
    AmountRange(u128),

    /// Arithmetic overflow in settlement valuation
    #[error("Arithmetic overflow: {0}")]
    ArithmeticOverflow(String),

    /// Processing lock not acquired within the configured bound
    #[error("Processing lock timed out after {timeout_ms}ms at block {block}")]
    LockTimeout {
        /// Block whose processing gave up
        block: u64,
        /// Configured bound
        timeout_ms: u64,
    },

    /// A block's processing exceeded the configured bound
    #[error("Processing of block {block} exceeded {timeout_ms}ms")]
    ProcessingTimeout {
        /// Block whose processing overran
        block: u64,
        /// Configured bound
        timeout_ms: u64,
    },

    /// The head subscription ended
    #[error("Head subscription closed")]
    SubscriptionClosed,

    /// Critical exit: fatal state persisted, the process must terminate
    #[error("Halted at block {block}: {reason}")]
    Halted {
        /// Faulting block
        block: u64,
        /// Underlying failure
        reason: String,
    },

    /// Metrics registration error
    #[error("Metrics error: {0}")]
    Metrics(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<prometheus::Error> for Error {
    fn from(err: prometheus::Error) -> Self {
        Error::Metrics(err.to_string())
    }
}
