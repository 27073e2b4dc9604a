//! Compensating burn submission
//!
//! Burning runs under its own lock, distinct from the processing lock:
//! burning must not block block ingestion, but two concurrent burns from the
//! single signing key would race on transaction priority. A failed burn is
//! recoverable; the next qualifying block retries. Burn failures therefore
//! never propagate into the block-processing path.

use reserve_ledger::{AccountId, LedgerStore};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::{
    chain::{ChainClient, TxOutcome},
    metrics::Metrics,
    Error, Result,
};

/// Asynchronous burn submitter for the reserve address
#[derive(Clone)]
pub struct BurnTrigger {
    chain: Arc<dyn ChainClient>,
    store: Arc<LedgerStore>,
    reserve_address: AccountId,
    burn_fee: u64,
    lock: Arc<Mutex<()>>,
    metrics: Metrics,
}

impl BurnTrigger {
    /// Create new burn trigger
    pub fn new(
        chain: Arc<dyn ChainClient>,
        store: Arc<LedgerStore>,
        reserve_address: AccountId,
        burn_fee: u64,
        metrics: Metrics,
    ) -> Self {
        Self {
            chain,
            store,
            reserve_address,
            burn_fee,
            lock: Arc::new(Mutex::new(())),
            metrics,
        }
    }

    /// Fire-and-forget: spawn a burn attempt for the balance accumulated up
    /// to `block_height`. Never blocks the caller.
    pub fn fire(&self, block_height: u64) {
        let trigger = self.clone();
        tokio::spawn(async move {
            trigger.run(block_height).await;
        });
    }

    async fn run(&self, block_height: u64) {
        // An in-flight burn owns the signing key; skip rather than queue
        let _guard = match self.lock.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                tracing::debug!(block_height, "Burn already in flight, skipping");
                return;
            }
        };

        if let Err(err) = self.submit(block_height).await {
            tracing::warn!(block_height, error = %err, "Burn submission failed");
            if let Err(store_err) = self
                .store
                .record_warning(block_height, format!("Burn submission failed: {}", err))
            {
                tracing::error!(block_height, error = %store_err, "Failed to record burn outcome");
            }
        }
    }

    async fn submit(&self, block_height: u64) -> Result<()> {
        let balance = self.chain.free_balance(&self.reserve_address).await?;
        let burnable = balance.saturating_sub(self.burn_fee as u128);

        if burnable == 0 {
            tracing::debug!(block_height, balance, "No burnable balance");
            return Ok(());
        }

        self.metrics.record_burn_submitted();
        match self.chain.submit_burn(burnable).await? {
            TxOutcome::Finalized { block_hash } => {
                tracing::info!(
                    block_height,
                    amount = burnable,
                    %block_hash,
                    "Burn transaction finalized"
                );
                Ok(())
            }
            TxOutcome::Failed { reason } => {
                Err(Error::Chain(format!("Burn transaction failed: {}", reason)))
            }
        }
    }
}
