//! Sequential block processing
//!
//! One block at a time, in height order, under a single global processing
//! lock. A block's ledger effects (exchange records, pool decrement, burn
//! records, cursor advance) commit atomically, so from the perspective of
//! any later block a block either happened completely or not at all.

use chrono::Utc;
use reserve_ledger::{
    AccountId, BlockCommit, Burn, Exchange, ExchangeStatus, LedgerStore, PoolChange,
    ProcessingWarning,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::{
    burn::BurnTrigger,
    chain::{ChainClient, ChainEvent, Header},
    config::MonitorConfig,
    metrics::Metrics,
    pricing::{pool_price, to_tokens},
    Error, Result,
};

/// What processing a block amounted to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOutcome {
    /// Effects committed and cursor advanced
    Processed,
    /// Height at or below the cursor; duplicate delivery ignored
    Skipped,
}

/// The per-block settlement state machine
pub struct BlockProcessor {
    chain: Arc<dyn ChainClient>,
    store: Arc<LedgerStore>,
    config: MonitorConfig,
    reserve_address: AccountId,
    lock: Mutex<()>,
    burn: BurnTrigger,
    metrics: Metrics,
}

impl BlockProcessor {
    /// Create new block processor
    pub fn new(
        chain: Arc<dyn ChainClient>,
        store: Arc<LedgerStore>,
        config: MonitorConfig,
        metrics: Metrics,
    ) -> Self {
        let reserve_address = AccountId::new(config.reserve_address.clone());
        let burn = BurnTrigger::new(
            chain.clone(),
            store.clone(),
            reserve_address.clone(),
            config.burn_fee,
            metrics.clone(),
        );
        Self {
            chain,
            store,
            config,
            reserve_address,
            lock: Mutex::new(()),
            burn,
            metrics,
        }
    }

    /// Process one block, bounded by the configured processing timeout
    ///
    /// Errors mean the block failed wholly; the caller escalates through the
    /// critical-exit procedure. The processing lock is released on every
    /// exit path, including timeout (dropping the timed-out future drops the
    /// guard).
    pub async fn process_block(&self, header: &Header) -> Result<BlockOutcome> {
        let bound = Duration::from_millis(self.config.block_timeout_ms);
        match tokio::time::timeout(bound, self.process_inner(header)).await {
            Ok(result) => result,
            Err(_) => Err(Error::ProcessingTimeout {
                block: header.height,
                timeout_ms: self.config.block_timeout_ms,
            }),
        }
    }

    async fn process_inner(&self, header: &Header) -> Result<BlockOutcome> {
        let lock_bound = Duration::from_millis(self.config.lock_timeout_ms);
        let _guard = tokio::time::timeout(lock_bound, self.lock.lock())
            .await
            .map_err(|_| Error::LockTimeout {
                block: header.height,
                timeout_ms: self.config.lock_timeout_ms,
            })?;

        // Idempotence guard against duplicate delivery
        if header.height <= self.store.last_block_processed() {
            tracing::debug!(block = header.height, "Block already processed, skipping");
            return Ok(BlockOutcome::Skipped);
        }

        let started = Instant::now();

        let block_time = self.chain.timestamp(&header.hash).await?;
        // Parent-block issuance: a block's own transfers must not influence
        // the price used to value them
        let issuance_raw = self.chain.issuance(&header.parent_hash).await?;
        let issuance = to_tokens(issuance_raw, self.config.token_decimals)?;

        // Fold due scheduled pool increases before pricing
        let pool = self.store.refresh(header.height, block_time, issuance)?;
        let price = pool_price(pool, issuance)?;

        let events = self.chain.events(&header.hash).await?;
        let logged_at = Utc::now();
        let mut commit = BlockCommit::default();
        let mut sum_tokens = Decimal::ZERO;

        for event in events {
            match event {
                ChainEvent::TransferToReserve { sender, amount } if amount > 0 => {
                    let tokens = to_tokens(amount, self.config.token_decimals)?;
                    let amount_usd = tokens
                        .checked_mul(price)
                        .ok_or_else(|| Error::ArithmeticOverflow("amount * price".to_string()))?;

                    commit.exchanges.push(Exchange {
                        sender,
                        recipient: self.reserve_address.clone(),
                        amount: tokens,
                        amount_usd,
                        price,
                        block_height: header.height,
                        block_time,
                        logged_at,
                        status: ExchangeStatus::Pending,
                    });
                    commit.sum_usd = commit
                        .sum_usd
                        .checked_add(amount_usd)
                        .ok_or_else(|| Error::ArithmeticOverflow("sum of exchanges".to_string()))?;
                    sum_tokens += tokens;
                }
                ChainEvent::TransferToReserve { .. } => {
                    // Zero-amount transfers settle nothing
                }
                ChainEvent::BurnConfirmed { amount } => {
                    let tokens = to_tokens(amount, self.config.token_decimals)?;
                    commit.burns.push(Burn {
                        amount: tokens,
                        block_height: header.height,
                        block_time,
                        logged_at,
                    });
                    commit.tokens_burned += tokens;
                }
                ChainEvent::Other => {}
            }
        }

        let finalized_height = self.chain.finalized_height().await?;
        if header.height > finalized_height {
            let message = format!(
                "Processing block {} ahead of finalized height {}",
                header.height, finalized_height
            );
            tracing::warn!(block = header.height, finalized_height, "{}", message);
            commit.warnings.push(ProcessingWarning {
                block_height: header.height,
                recorded_at: logged_at,
                message,
            });
        }

        if commit.sum_usd != Decimal::ZERO {
            let pool_after = pool
                .checked_sub(commit.sum_usd)
                .ok_or_else(|| Error::ArithmeticOverflow("pool decrement".to_string()))?;
            commit.pool_change = Some(PoolChange {
                block_height: header.height,
                block_time,
                delta: -commit.sum_usd,
                issuance,
                pool_after,
                price_after: pool_price(pool_after, issuance)?,
                reason: format!("{} exchange(s) settled", commit.exchanges.len()),
            });
        }

        let exchange_count = commit.exchanges.len();
        let sum_usd = commit.sum_usd;
        self.store.commit_block(header.height, commit)?;

        self.metrics
            .record_block(exchange_count, started.elapsed().as_secs_f64());
        self.metrics
            .update_pool_value(self.store.pool().to_f64().unwrap_or(f64::NAN));

        // Burning never blocks lock release
        if sum_tokens > Decimal::ZERO {
            self.burn.fire(header.height);
        }

        tracing::info!(
            block = header.height,
            exchanges = exchange_count,
            sum_usd = %sum_usd,
            price = %price,
            "Block processed"
        );

        Ok(BlockOutcome::Processed)
    }
}

impl std::fmt::Debug for BlockProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockProcessor")
            .field("reserve_address", &self.reserve_address)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockBlock, MockChainClient};
    use reserve_ledger::StoreConfig;
    use tempfile::TempDir;

    fn test_config() -> MonitorConfig {
        MonitorConfig {
            reserve_address: "5Reserve".to_string(),
            finality_depth: 0,
            first_block: 1,
            token_decimals: 0,
            block_timeout_ms: 5_000,
            lock_timeout_ms: 1_000,
            burn_fee: 10,
        }
    }

    fn test_store(initial_pool: Decimal, initial_cursor: u64) -> (Arc<LedgerStore>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config = StoreConfig {
            data_dir: temp_dir.path().to_path_buf(),
            initial_pool,
            initial_cursor,
            ..Default::default()
        };
        (Arc::new(LedgerStore::open(&config).unwrap()), temp_dir)
    }

    #[tokio::test]
    async fn test_transfer_becomes_exchange() {
        let chain = Arc::new(MockChainClient::new());
        chain.set_default_issuance(1_000_000);
        chain.set_finalized_height(10);
        chain.insert_block(
            1,
            MockBlock::new(vec![ChainEvent::TransferToReserve {
                sender: AccountId::new("5Sender"),
                amount: 1_000,
            }]),
        );

        let (store, _temp) = test_store(Decimal::new(50_000, 0), 0);
        let processor = BlockProcessor::new(
            chain.clone(),
            store.clone(),
            test_config(),
            Metrics::new().unwrap(),
        );

        let header = chain.header_at(1);
        let outcome = processor.process_block(&header).await.unwrap();
        assert_eq!(outcome, BlockOutcome::Processed);

        let exchanges = store.exchanges().unwrap();
        assert_eq!(exchanges.len(), 1);
        assert_eq!(exchanges[0].amount, Decimal::new(1_000, 0));
        assert_eq!(exchanges[0].amount_usd, Decimal::new(50, 0));
        assert_eq!(exchanges[0].price, Decimal::new(5, 2));
        assert_eq!(store.pool(), Decimal::new(49_950, 0));
        assert_eq!(store.last_block_processed(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_block_skipped() {
        let chain = Arc::new(MockChainClient::new());
        chain.set_default_issuance(1_000_000);
        chain.set_finalized_height(10);
        chain.insert_block(
            1,
            MockBlock::new(vec![ChainEvent::TransferToReserve {
                sender: AccountId::new("5Sender"),
                amount: 1_000,
            }]),
        );

        let (store, _temp) = test_store(Decimal::new(50_000, 0), 0);
        let processor = BlockProcessor::new(
            chain.clone(),
            store.clone(),
            test_config(),
            Metrics::new().unwrap(),
        );

        let header = chain.header_at(1);
        assert_eq!(
            processor.process_block(&header).await.unwrap(),
            BlockOutcome::Processed
        );
        assert_eq!(
            processor.process_block(&header).await.unwrap(),
            BlockOutcome::Skipped
        );

        // No duplicated effects
        assert_eq!(store.exchanges().unwrap().len(), 1);
        assert_eq!(store.pool_changes().unwrap().len(), 1);
        assert_eq!(store.pool(), Decimal::new(49_950, 0));
    }

    #[tokio::test]
    async fn test_zero_amount_transfer_ignored() {
        let chain = Arc::new(MockChainClient::new());
        chain.set_default_issuance(1_000_000);
        chain.set_finalized_height(10);
        chain.insert_block(
            1,
            MockBlock::new(vec![ChainEvent::TransferToReserve {
                sender: AccountId::new("5Sender"),
                amount: 0,
            }]),
        );

        let (store, _temp) = test_store(Decimal::new(50_000, 0), 0);
        let processor = BlockProcessor::new(
            chain.clone(),
            store.clone(),
            test_config(),
            Metrics::new().unwrap(),
        );

        processor.process_block(&chain.header_at(1)).await.unwrap();
        assert!(store.exchanges().unwrap().is_empty());
        assert_eq!(store.pool(), Decimal::new(50_000, 0));
        assert_eq!(store.last_block_processed(), 1);
    }

    #[tokio::test]
    async fn test_ahead_of_finality_warns() {
        let chain = Arc::new(MockChainClient::new());
        chain.set_default_issuance(1_000_000);
        chain.set_finalized_height(0);
        chain.insert_block(1, MockBlock::new(vec![]));

        let (store, _temp) = test_store(Decimal::new(50_000, 0), 0);
        let processor = BlockProcessor::new(
            chain.clone(),
            store.clone(),
            test_config(),
            Metrics::new().unwrap(),
        );

        processor.process_block(&chain.header_at(1)).await.unwrap();
        let warnings = store.warnings().unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("ahead of finalized"));
    }

    #[tokio::test]
    async fn test_burn_event_recorded() {
        let chain = Arc::new(MockChainClient::new());
        chain.set_default_issuance(1_000_000);
        chain.set_finalized_height(10);
        chain.insert_block(
            1,
            MockBlock::new(vec![ChainEvent::BurnConfirmed { amount: 500 }]),
        );

        let (store, _temp) = test_store(Decimal::new(50_000, 0), 0);
        let processor = BlockProcessor::new(
            chain.clone(),
            store.clone(),
            test_config(),
            Metrics::new().unwrap(),
        );

        processor.process_block(&chain.header_at(1)).await.unwrap();
        let burns = store.burns().unwrap();
        assert_eq!(burns.len(), 1);
        assert_eq!(burns[0].amount, Decimal::new(500, 0));
        assert_eq!(store.meta().tokens_burned, Decimal::new(500, 0));
        // A confirmed burn alone settles nothing
        assert_eq!(store.pool(), Decimal::new(50_000, 0));
    }

    #[tokio::test]
    async fn test_zero_issuance_is_fatal() {
        let chain = Arc::new(MockChainClient::new());
        chain.set_default_issuance(0);
        chain.set_finalized_height(10);
        chain.insert_block(1, MockBlock::new(vec![]));

        let (store, _temp) = test_store(Decimal::new(50_000, 0), 0);
        let processor = BlockProcessor::new(
            chain.clone(),
            store.clone(),
            test_config(),
            Metrics::new().unwrap(),
        );

        let err = processor.process_block(&chain.header_at(1)).await.unwrap_err();
        assert!(matches!(err, Error::ZeroIssuance));
        // Nothing committed
        assert_eq!(store.last_block_processed(), 0);
    }
}
