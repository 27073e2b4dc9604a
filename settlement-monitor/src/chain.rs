//! Chain-facing seam
//!
//! The monitor never talks to a node directly; it consumes the
//! [`ChainClient`] trait. Event decoding happens behind this boundary: the
//! client yields a closed set of domain events ([`ChainEvent`]) so the block
//! processor never inspects raw chain event shapes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reserve_ledger::AccountId;
use std::fmt;
use tokio::sync::mpsc;

use crate::Result;

/// Opaque block hash
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockHash([u8; 32]);

impl BlockHash {
    /// Create from raw bytes
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x")?;
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// Block header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Block height
    pub height: u64,

    /// Hash of this block
    pub hash: BlockHash,

    /// Hash of the parent block
    pub parent_hash: BlockHash,
}

/// Decoded domain event
///
/// The closed set the block processor operates on. Amounts are raw chain
/// base units; the mapping is deterministic and event-amount-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainEvent {
    /// Token transfer whose recipient is the reserve address
    TransferToReserve {
        /// Sender of the transfer
        sender: AccountId,
        /// Transferred amount, base units
        amount: u128,
    },

    /// Burn confirmed at the reserve address
    BurnConfirmed {
        /// Burned amount, base units
        amount: u128,
    },

    /// Any event the monitor does not care about
    Other,
}

/// Outcome of a submitted burn transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxOutcome {
    /// Transaction included and finalized
    Finalized {
        /// Block the transaction finalized in
        block_hash: BlockHash,
    },

    /// Transaction rejected or dropped
    Failed {
        /// Failure description from the chain
        reason: String,
    },
}

/// Interface to the running chain
///
/// Implemented elsewhere against the node's RPC; implemented in-memory by
/// [`crate::testing::MockChainClient`] for tests.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Subscribe to new (best, not finalized) chain heads
    async fn subscribe_new_heads(&self) -> Result<mpsc::Receiver<Header>>;

    /// Canonical hash at a height
    async fn block_hash(&self, height: u64) -> Result<BlockHash>;

    /// Header by hash
    async fn header(&self, hash: &BlockHash) -> Result<Header>;

    /// Decoded domain events of a block, in emitted order
    async fn events(&self, hash: &BlockHash) -> Result<Vec<ChainEvent>>;

    /// Total token issuance as of a block, base units
    async fn issuance(&self, hash: &BlockHash) -> Result<u128>;

    /// Wall-clock timestamp of a block
    async fn timestamp(&self, hash: &BlockHash) -> Result<DateTime<Utc>>;

    /// Height of the last finalized block
    async fn finalized_height(&self) -> Result<u64>;

    /// Free balance of an account, base units
    async fn free_balance(&self, account: &AccountId) -> Result<u128>;

    /// Submit a burn of `amount` base units from the reserve address
    async fn submit_burn(&self, amount: u128) -> Result<TxOutcome>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_hash_display() {
        let mut bytes = [0u8; 32];
        bytes[0] = 0xab;
        bytes[31] = 0x01;
        let hash = BlockHash::new(bytes);
        let hex = hash.to_string();
        assert!(hex.starts_with("0xab00"));
        assert!(hex.ends_with("01"));
        assert_eq!(hex.len(), 2 + 64);
    }
}
