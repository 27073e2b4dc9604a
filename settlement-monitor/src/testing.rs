//! In-memory chain client for tests
//!
//! Scripted implementation of [`ChainClient`]: blocks, events, issuance,
//! balances and burn outcomes are set up front; head notifications are
//! pushed explicitly. Block hashes encode the height so headers and lookups
//! stay consistent without a real chain.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use reserve_ledger::AccountId;
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::mpsc;

use crate::chain::{BlockHash, ChainClient, ChainEvent, Header, TxOutcome};
use crate::{Error, Result};

/// One scripted block
#[derive(Debug, Clone, Default)]
pub struct MockBlock {
    /// Decoded events, in emitted order
    pub events: Vec<ChainEvent>,

    /// Issuance at this block; falls back to the client-wide default
    pub issuance: Option<u128>,

    /// Block time; falls back to a deterministic per-height time
    pub timestamp: Option<DateTime<Utc>>,
}

impl MockBlock {
    /// Block with the given events
    pub fn new(events: Vec<ChainEvent>) -> Self {
        Self {
            events,
            ..Default::default()
        }
    }

    /// Override the issuance at this block
    pub fn with_issuance(mut self, issuance: u128) -> Self {
        self.issuance = Some(issuance);
        self
    }
}

#[derive(Default)]
struct MockState {
    blocks: BTreeMap<u64, MockBlock>,
    default_issuance: u128,
    finalized_height: u64,
    balances: HashMap<AccountId, u128>,
    submitted_burns: Vec<u128>,
    fail_burns: Option<String>,
    fail_events_at: HashSet<u64>,
    head_senders: Vec<mpsc::Sender<Header>>,
}

/// Scripted in-memory chain
#[derive(Default)]
pub struct MockChainClient {
    state: Mutex<MockState>,
}

impl MockChainClient {
    /// Create an empty mock chain
    pub fn new() -> Self {
        Self::default()
    }

    fn hash_for(height: u64) -> BlockHash {
        let mut bytes = [0u8; 32];
        bytes[..8].copy_from_slice(&height.to_be_bytes());
        BlockHash::new(bytes)
    }

    fn height_of(hash: &BlockHash) -> u64 {
        let bytes: [u8; 8] = hash.as_bytes()[..8].try_into().expect("hash holds 8 bytes");
        u64::from_be_bytes(bytes)
    }

    /// Header a real subscription would deliver for `height`
    pub fn header_at(&self, height: u64) -> Header {
        Header {
            height,
            hash: Self::hash_for(height),
            parent_hash: Self::hash_for(height.saturating_sub(1)),
        }
    }

    /// Script a block
    pub fn insert_block(&self, height: u64, block: MockBlock) {
        self.state.lock().blocks.insert(height, block);
    }

    /// Script a run of empty blocks (inclusive range)
    pub fn insert_empty_blocks(&self, from: u64, to: u64) {
        let mut state = self.state.lock();
        for height in from..=to {
            state.blocks.entry(height).or_default();
        }
    }

    /// Issuance used where no block-specific value is scripted
    pub fn set_default_issuance(&self, issuance: u128) {
        self.state.lock().default_issuance = issuance;
    }

    /// Height reported as finalized
    pub fn set_finalized_height(&self, height: u64) {
        self.state.lock().finalized_height = height;
    }

    /// Free balance reported for an account
    pub fn set_free_balance(&self, account: AccountId, amount: u128) {
        self.state.lock().balances.insert(account, amount);
    }

    /// Make `events()` fail at the given height
    pub fn fail_events_at(&self, height: u64) {
        self.state.lock().fail_events_at.insert(height);
    }

    /// Make every subsequent burn submission report failure
    pub fn fail_burns(&self, reason: impl Into<String>) {
        self.state.lock().fail_burns = Some(reason.into());
    }

    /// Amounts of all submitted burns, in submission order
    pub fn submitted_burns(&self) -> Vec<u128> {
        self.state.lock().submitted_burns.clone()
    }

    /// Push a head notification to every subscriber
    pub fn announce_head(&self, height: u64) {
        let header = self.header_at(height);
        self.state
            .lock()
            .head_senders
            .retain(|tx| tx.try_send(header.clone()).is_ok());
    }

    /// Close all head subscriptions
    ///
    /// Already-announced heads stay buffered and are still delivered before
    /// the subscriber's stream ends.
    pub fn close_heads(&self) {
        self.state.lock().head_senders.clear();
    }

    /// Number of live head subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.state.lock().head_senders.len()
    }
}

#[async_trait::async_trait]
impl ChainClient for MockChainClient {
    async fn subscribe_new_heads(&self) -> Result<mpsc::Receiver<Header>> {
        let (tx, rx) = mpsc::channel(64);
        self.state.lock().head_senders.push(tx);
        Ok(rx)
    }

    async fn block_hash(&self, height: u64) -> Result<BlockHash> {
        if self.state.lock().blocks.contains_key(&height) {
            Ok(Self::hash_for(height))
        } else {
            Err(Error::Chain(format!("Unknown block at height {}", height)))
        }
    }

    async fn header(&self, hash: &BlockHash) -> Result<Header> {
        let height = Self::height_of(hash);
        if self.state.lock().blocks.contains_key(&height) {
            Ok(self.header_at(height))
        } else {
            Err(Error::Chain(format!("Unknown block at height {}", height)))
        }
    }

    async fn events(&self, hash: &BlockHash) -> Result<Vec<ChainEvent>> {
        let height = Self::height_of(hash);
        let state = self.state.lock();
        if state.fail_events_at.contains(&height) {
            return Err(Error::Chain(format!(
                "Injected events failure at block {}",
                height
            )));
        }
        state
            .blocks
            .get(&height)
            .map(|block| block.events.clone())
            .ok_or_else(|| Error::Chain(format!("Unknown block at height {}", height)))
    }

    async fn issuance(&self, hash: &BlockHash) -> Result<u128> {
        let height = Self::height_of(hash);
        let state = self.state.lock();
        Ok(state
            .blocks
            .get(&height)
            .and_then(|block| block.issuance)
            .unwrap_or(state.default_issuance))
    }

    async fn timestamp(&self, hash: &BlockHash) -> Result<DateTime<Utc>> {
        let height = Self::height_of(hash);
        let scripted = self
            .state
            .lock()
            .blocks
            .get(&height)
            .and_then(|block| block.timestamp);
        // 6-second block time from a fixed genesis keeps tests deterministic
        Ok(scripted.unwrap_or_else(|| {
            DateTime::<Utc>::from_timestamp(1_700_000_000 + height as i64 * 6, 0)
                .unwrap_or_else(Utc::now)
        }))
    }

    async fn finalized_height(&self) -> Result<u64> {
        Ok(self.state.lock().finalized_height)
    }

    async fn free_balance(&self, account: &AccountId) -> Result<u128> {
        Ok(self
            .state
            .lock()
            .balances
            .get(account)
            .copied()
            .unwrap_or(0))
    }

    async fn submit_burn(&self, amount: u128) -> Result<TxOutcome> {
        let mut state = self.state.lock();
        state.submitted_burns.push(amount);
        match &state.fail_burns {
            Some(reason) => Ok(TxOutcome::Failed {
                reason: reason.clone(),
            }),
            None => Ok(TxOutcome::Finalized {
                block_hash: Self::hash_for(state.finalized_height),
            }),
        }
    }
}

impl std::fmt::Debug for MockChainClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockChainClient").finish_non_exhaustive()
    }
}
