//! Chain-head watching
//!
//! Subscribes to new best heads and drives catch-up towards
//! `head - finality_depth`. Processing strictly-finalized blocks only would
//! stall on slow finality; the depth offset trades a small reorg risk for
//! steady throughput, and a block processed ahead of finality is always
//! flagged with a warning, never hidden.

use reserve_ledger::LedgerStore;
use std::sync::Arc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

use crate::{
    catchup::CatchUpDriver,
    chain::{ChainClient, Header},
    config::MonitorConfig,
    metrics::Metrics,
    processor::BlockProcessor,
    Error, Result,
};

/// Top-level monitor loop: head subscription → catch-up → block processing
pub struct HeadWatcher {
    chain: Arc<dyn ChainClient>,
    store: Arc<LedgerStore>,
    driver: CatchUpDriver,
    config: MonitorConfig,
    metrics: Metrics,
}

impl HeadWatcher {
    /// Wire up the full processing pipeline
    pub fn new(
        chain: Arc<dyn ChainClient>,
        store: Arc<LedgerStore>,
        config: MonitorConfig,
    ) -> Result<Self> {
        let metrics = Metrics::new()?;
        let processor = Arc::new(BlockProcessor::new(
            chain.clone(),
            store.clone(),
            config.clone(),
            metrics.clone(),
        ));
        let driver = CatchUpDriver::new(
            chain.clone(),
            store.clone(),
            processor,
            metrics.clone(),
        );

        Ok(Self {
            chain,
            store,
            driver,
            config,
            metrics,
        })
    }

    /// Metrics collector for scraping
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Consume head notifications until the subscription closes or a block
    /// fails fatally
    ///
    /// Notifications arriving during an in-flight catch-up coalesce: the
    /// loop is the only consumer, and each notification recomputes its
    /// target against the now-current cursor, so concurrent catch-up runs
    /// cannot start. Returns [`Error::Halted`] on critical exit and
    /// [`Error::SubscriptionClosed`] when the head stream ends; the
    /// supervising caller terminates the process either way and an external
    /// supervisor restarts it from the persisted cursor.
    pub async fn run(&self) -> Result<()> {
        let heads = self.chain.subscribe_new_heads().await?;
        let mut heads = ReceiverStream::new(heads);

        tracing::info!(
            finality_depth = self.config.finality_depth,
            first_block = self.config.first_block,
            cursor = self.store.last_block_processed(),
            "Watching chain heads"
        );

        while let Some(header) = heads.next().await {
            self.on_head(&header).await?;
        }

        Err(Error::SubscriptionClosed)
    }

    async fn on_head(&self, header: &Header) -> Result<()> {
        let target = header.height.saturating_sub(self.config.finality_depth);
        let cursor = self.store.last_block_processed();

        if target < self.config.first_block || target <= cursor {
            tracing::debug!(head = header.height, target, cursor, "No new safe blocks");
            return Ok(());
        }

        self.driver.run(cursor + 1, target).await
    }
}

impl std::fmt::Debug for HeadWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeadWatcher")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
