//! Metrics collection for observability
//!
//! Prometheus metrics for monitoring block ingestion and settlement.
//!
//! # Metrics
//!
//! - `monitor_blocks_processed_total` - Blocks fully committed
//! - `monitor_exchanges_total` - Settlement records written
//! - `monitor_burns_submitted_total` - Burn transactions submitted
//! - `monitor_processing_errors_total` - Fatal block failures
//! - `monitor_pool_value_usd` - Current reserve pool value
//! - `monitor_block_duration_seconds` - Per-block processing latency

use prometheus::{Gauge, Histogram, HistogramOpts, IntCounter, Opts, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Blocks fully committed
    pub blocks_processed: IntCounter,

    /// Settlement records written
    pub exchanges: IntCounter,

    /// Burn transactions submitted
    pub burns_submitted: IntCounter,

    /// Fatal block failures
    pub processing_errors: IntCounter,

    /// Current reserve pool value (USD)
    pub pool_value: Gauge,

    /// Per-block processing latency
    pub block_duration: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let blocks_processed = IntCounter::with_opts(Opts::new(
            "monitor_blocks_processed_total",
            "Blocks fully committed",
        ))?;
        registry.register(Box::new(blocks_processed.clone()))?;

        let exchanges = IntCounter::with_opts(Opts::new(
            "monitor_exchanges_total",
            "Settlement records written",
        ))?;
        registry.register(Box::new(exchanges.clone()))?;

        let burns_submitted = IntCounter::with_opts(Opts::new(
            "monitor_burns_submitted_total",
            "Burn transactions submitted",
        ))?;
        registry.register(Box::new(burns_submitted.clone()))?;

        let processing_errors = IntCounter::with_opts(Opts::new(
            "monitor_processing_errors_total",
            "Fatal block failures",
        ))?;
        registry.register(Box::new(processing_errors.clone()))?;

        let pool_value = Gauge::with_opts(Opts::new(
            "monitor_pool_value_usd",
            "Current reserve pool value",
        ))?;
        registry.register(Box::new(pool_value.clone()))?;

        let block_duration = Histogram::with_opts(
            HistogramOpts::new(
                "monitor_block_duration_seconds",
                "Per-block processing latency",
            )
            .buckets(vec![0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 5.0]),
        )?;
        registry.register(Box::new(block_duration.clone()))?;

        Ok(Self {
            blocks_processed,
            exchanges,
            burns_submitted,
            processing_errors,
            pool_value,
            block_duration,
            registry,
        })
    }

    /// Record a committed block
    pub fn record_block(&self, exchanges: usize, duration_seconds: f64) {
        self.blocks_processed.inc();
        self.exchanges.inc_by(exchanges as u64);
        self.block_duration.observe(duration_seconds);
    }

    /// Record a submitted burn
    pub fn record_burn_submitted(&self) {
        self.burns_submitted.inc();
    }

    /// Record a fatal block failure
    pub fn record_processing_error(&self) {
        self.processing_errors.inc();
    }

    /// Update the pool gauge
    pub fn update_pool_value(&self, pool_usd: f64) {
        self.pool_value.set(pool_usd);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
