//! Configuration for the settlement ledger

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Ledger store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// Pool value seeded on first open (USD)
    pub initial_pool: Decimal,

    /// Cursor seeded on first open: the block before the first block to
    /// process
    pub initial_cursor: u64,

    /// Fsync every commit before returning
    pub sync_writes: bool,

    /// RocksDB configuration
    pub rocksdb: RocksDbConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/ledger"),
            initial_pool: Decimal::ZERO,
            initial_cursor: 0,
            sync_writes: true,
            rocksdb: RocksDbConfig::default(),
        }
    }
}

/// RocksDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RocksDbConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 64,
            max_write_buffer_number: 4,
            max_background_jobs: 2,
        }
    }
}

impl StoreConfig {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: StoreConfig = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = StoreConfig::default();

        if let Ok(data_dir) = std::env::var("LEDGER_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(pool) = std::env::var("LEDGER_INITIAL_POOL") {
            config.initial_pool = pool
                .parse()
                .map_err(|e| crate::Error::Config(format!("Invalid LEDGER_INITIAL_POOL: {}", e)))?;
        }

        if let Ok(cursor) = std::env::var("LEDGER_INITIAL_CURSOR") {
            config.initial_cursor = cursor
                .parse()
                .map_err(|e| crate::Error::Config(format!("Invalid LEDGER_INITIAL_CURSOR: {}", e)))?;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StoreConfig::default();
        assert_eq!(config.initial_pool, Decimal::ZERO);
        assert!(config.sync_writes);
    }
}
