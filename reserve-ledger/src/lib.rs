//! Reserve Settlement Ledger
//!
//! Persisted settlement document for the reserve monitor: exchanges, burns,
//! pool-change audit trail, diagnostics, scheduled pool increases and the
//! scalar head (pool value, processing cursor, cumulative totals).
//!
//! # Architecture
//!
//! - **Single document**: all mutable settlement state lives in one RocksDB
//!   database owned by one `LedgerStore`
//! - **Atomic mutate**: every operation is one `WriteBatch` under a writer
//!   mutex; a block's effects land wholly or not at all
//! - **Durable commits**: writes are synchronous, so a crash between blocks
//!   never loses a committed block
//!
//! # Invariants
//!
//! - Pool conservation: pool == initial + applied increases − settled USD
//! - Cursor monotonicity: `last_block_processed` never decreases and
//!   advances by exactly one per committed block
//! - Append-only history: records are never deleted; only an exchange's
//!   status may change after commit

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod config;
pub mod error;
pub mod store;
pub mod types;

// Re-exports
pub use config::StoreConfig;
pub use error::{Error, Result};
pub use store::LedgerStore;
pub use types::{
    AccountId, BlockCommit, Burn, Exchange, ExchangeStatus, LedgerDocument, Meta, PoolChange,
    ProcessingError, ProcessingWarning, ScheduledPoolIncrease,
};
