//! Reserve Settlement Monitor
//!
//! Observes a running chain, converts token transfers into the reserve
//! address into USD-valued settlements against a dynamically priced reserve
//! pool, and triggers compensating burns.
//!
//! # Architecture
//!
//! - **Sequential ingestion**: one global processing lock; blocks are
//!   processed in strictly increasing height order with no gaps
//! - **Parent-block pricing**: `price = pool / issuance`, evaluated against
//!   the parent block's issuance so a block cannot value its own transfers
//! - **Fail fast**: an unrecoverable block failure persists a diagnostic
//!   record plus the poison-block cursor, then hands the caller a
//!   distinguished halt signal; an external supervisor restarts the process
//! - **Independent burn domain**: burns run under their own lock and never
//!   block ingestion
//!
//! # Example
//!
//! ```no_run
//! use reserve_ledger::{LedgerStore, StoreConfig};
//! use settlement_monitor::{testing::MockChainClient, HeadWatcher, MonitorConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     tracing_subscriber::fmt()
//!         .with_env_filter(
//!             tracing_subscriber::EnvFilter::from_default_env()
//!                 .add_directive(tracing::Level::INFO.into()),
//!         )
//!         .init();
//!
//!     let store = Arc::new(LedgerStore::open(&StoreConfig::from_env()?)?);
//!     // A node-backed ChainClient implementation goes here
//!     let chain = Arc::new(MockChainClient::new());
//!     let watcher = HeadWatcher::new(chain, store, MonitorConfig::from_env()?)?;
//!
//!     // Halted and SubscriptionClosed are both fatal; the supervisor
//!     // restarts the process from the persisted cursor
//!     if let Err(err) = watcher.run().await {
//!         tracing::error!(error = %err, "Monitor stopped");
//!         std::process::exit(1);
//!     }
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod burn;
pub mod catchup;
pub mod chain;
pub mod config;
pub mod error;
pub mod metrics;
pub mod pricing;
pub mod processor;
pub mod testing;
pub mod watcher;

// Re-exports
pub use burn::BurnTrigger;
pub use catchup::CatchUpDriver;
pub use chain::{BlockHash, ChainClient, ChainEvent, Header, TxOutcome};
pub use config::MonitorConfig;
pub use error::{Error, Result};
pub use metrics::Metrics;
pub use processor::{BlockOutcome, BlockProcessor};
pub use watcher::HeadWatcher;
