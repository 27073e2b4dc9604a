//! Core types for the settlement ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Exact arithmetic (Decimal for USD values, token amounts and prices)
//! - Append-only history (records are never mutated after commit, with the
//!   single exception of an exchange's lifecycle status)

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Chain account identifier (SS58-style address)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(String);

impl AccountId {
    /// Create new account ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Exchange lifecycle status
///
/// `Pending` is set when the originating transfer is observed during block
/// processing. The transition to `Finalized` is an out-of-band
/// administrative action, never part of block processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ExchangeStatus {
    /// Settled on chain, payout not yet confirmed
    Pending = 1,
    /// Payout confirmed; `total_usd_paid` includes this exchange
    Finalized = 2,
}

impl fmt::Display for ExchangeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExchangeStatus::Pending => write!(f, "PENDING"),
            ExchangeStatus::Finalized => write!(f, "FINALIZED"),
        }
    }
}

/// One settlement record per qualifying transfer to the reserve address
///
/// `amount` and `amount_usd` are immutable once written; only `status`
/// changes later, through the administrative contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exchange {
    /// Sender of the transfer
    pub sender: AccountId,

    /// Recipient (the reserve address)
    pub recipient: AccountId,

    /// Token amount (whole tokens, exact decimal)
    pub amount: Decimal,

    /// USD value at the price used for this block
    pub amount_usd: Decimal,

    /// Price used to value this exchange (USD per token)
    pub price: Decimal,

    /// Block the transfer was observed in
    pub block_height: u64,

    /// Wall-clock time of the block
    pub block_time: DateTime<Utc>,

    /// Time the record was written
    pub logged_at: DateTime<Utc>,

    /// Lifecycle status
    pub status: ExchangeStatus,
}

/// One record per burn confirmed at the reserve address
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Burn {
    /// Burned token amount (whole tokens)
    pub amount: Decimal,

    /// Block the burn was observed in
    pub block_height: u64,

    /// Wall-clock time of the block
    pub block_time: DateTime<Utc>,

    /// Time the record was written
    pub logged_at: DateTime<Utc>,
}

/// Append-only audit record for every change to the reserve pool value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolChange {
    /// Block at which the change was applied
    pub block_height: u64,

    /// Wall-clock time of the block
    pub block_time: DateTime<Utc>,

    /// Signed delta applied to the pool (USD)
    pub delta: Decimal,

    /// Token issuance used at that block (whole tokens)
    pub issuance: Decimal,

    /// Pool value after the change (USD)
    pub pool_after: Decimal,

    /// Price after the change (USD per token)
    pub price_after: Decimal,

    /// Human-readable reason for the change
    pub reason: String,
}

/// Queued administrative pool increase
///
/// Consumed (removed) and folded into the pool the first time the ledger is
/// refreshed at or after `block_height`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledPoolIncrease {
    /// Height at or after which the increase applies
    pub block_height: u64,

    /// Amount to add to the pool (USD)
    pub amount: Decimal,

    /// Reason recorded in the resulting pool-change audit entry
    pub reason: String,
}

/// Diagnostic record for an unrecoverable block failure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingError {
    /// Faulting block
    pub block_height: u64,

    /// Time the record was written
    pub recorded_at: DateTime<Utc>,

    /// Failure description
    pub reason: String,
}

/// Diagnostic record for a tolerated anomaly
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingWarning {
    /// Block the warning refers to
    pub block_height: u64,

    /// Time the record was written
    pub recorded_at: DateTime<Utc>,

    /// Warning description
    pub message: String,
}

/// Scalar head of the settlement document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    /// Current USD value of the reserve pool
    pub size_dollar_pool: Decimal,

    /// Cursor: highest block whose effects are committed
    pub last_block_processed: u64,

    /// Cumulative tokens burned (whole tokens)
    pub tokens_burned: Decimal,

    /// Cumulative USD paid out for finalized exchanges
    pub total_usd_paid: Decimal,
}

/// Assembled whole-document view of the persisted ledger
///
/// Mirrors the schema of the persisted document: every append-only log plus
/// the scalar head. Produced by [`crate::LedgerStore::load`] for reporting
/// and tests; never used as a write path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerDocument {
    /// All settlement records, in commit order
    pub exchanges: Vec<Exchange>,

    /// All burn records, in commit order
    pub burns: Vec<Burn>,

    /// All unrecoverable-failure diagnostics
    pub errors: Vec<ProcessingError>,

    /// All tolerated-anomaly diagnostics
    pub warnings: Vec<ProcessingWarning>,

    /// Full audit history of pool mutations
    pub pool_change_history: Vec<PoolChange>,

    /// Pending administrative pool increases
    pub scheduled_pool_increases: Vec<ScheduledPoolIncrease>,

    /// Current USD value of the reserve pool
    pub size_dollar_pool: Decimal,

    /// Cursor: highest block whose effects are committed
    pub last_block_processed: u64,

    /// Cumulative tokens burned
    pub tokens_burned: Decimal,

    /// Cumulative USD paid out for finalized exchanges
    pub total_usd_paid: Decimal,
}

/// Everything one processed block writes, committed atomically
///
/// Either the whole batch lands (records, pool delta, cursor advance) or
/// none of it does.
#[derive(Debug, Clone, Default)]
pub struct BlockCommit {
    /// Exchanges settled in this block, in event order
    pub exchanges: Vec<Exchange>,

    /// Burns confirmed in this block, in event order
    pub burns: Vec<Burn>,

    /// Warnings raised while processing this block
    pub warnings: Vec<ProcessingWarning>,

    /// Pool-change audit record, present iff the block settled a non-zero
    /// USD amount
    pub pool_change: Option<PoolChange>,

    /// Total USD to subtract from the pool
    pub sum_usd: Decimal,

    /// Total tokens confirmed burned in this block
    pub tokens_burned: Decimal,
}
