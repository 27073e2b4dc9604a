//! Catch-up replay
//!
//! Replays every block between the cursor and a target height, strictly in
//! ascending order. Pool arithmetic is order-dependent, so skipping or
//! parallelizing heights would corrupt the ledger; the first failing block
//! triggers the critical-exit procedure and the remaining heights are not
//! attempted.

use reserve_ledger::LedgerStore;
use std::sync::Arc;

use crate::{
    chain::ChainClient,
    metrics::Metrics,
    processor::BlockProcessor,
    Error, Result,
};

/// Sequential block replayer
pub struct CatchUpDriver {
    chain: Arc<dyn ChainClient>,
    store: Arc<LedgerStore>,
    processor: Arc<BlockProcessor>,
    metrics: Metrics,
}

impl CatchUpDriver {
    /// Create new catch-up driver
    pub fn new(
        chain: Arc<dyn ChainClient>,
        store: Arc<LedgerStore>,
        processor: Arc<BlockProcessor>,
        metrics: Metrics,
    ) -> Self {
        Self {
            chain,
            store,
            processor,
            metrics,
        }
    }

    /// Process every block in `from..=to`, in ascending order
    ///
    /// Returns [`Error::Halted`] if any block fails; the fatal state has
    /// already been persisted when that happens.
    pub async fn run(&self, from: u64, to: u64) -> Result<()> {
        tracing::info!(from, to, "Catching up");

        for height in from..=to {
            if let Err(err) = self.process_height(height).await {
                return Err(self.critical_exit(height, err));
            }
        }

        tracing::info!(cursor = to, "Catch-up complete");
        Ok(())
    }

    async fn process_height(&self, height: u64) -> Result<()> {
        let hash = self.chain.block_hash(height).await?;
        let header = self.chain.header(&hash).await?;
        self.processor.process_block(&header).await?;
        Ok(())
    }

    /// Critical exit: persist the diagnostic record and force the cursor to
    /// the faulting block so it is never retried, then hand the caller the
    /// distinguished halt signal.
    fn critical_exit(&self, block: u64, err: Error) -> Error {
        let reason = err.to_string();
        tracing::error!(block, reason = %reason, "Unrecoverable block failure, halting");
        self.metrics.record_processing_error();

        if let Err(store_err) = self.store.record_fatal(block, reason.clone()) {
            // The ledger itself is failing; nothing more can be persisted
            tracing::error!(block, error = %store_err, "Failed to persist fatal state");
        }

        Error::Halted { block, reason }
    }
}

impl std::fmt::Debug for CatchUpDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatchUpDriver").finish_non_exhaustive()
    }
}
