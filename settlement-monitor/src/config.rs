//! Configuration for the settlement monitor

use serde::{Deserialize, Serialize};

/// Monitor configuration
///
/// All values are externally supplied constants; nothing here changes at
/// runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// The reserve address watched for incoming transfers and burns
    pub reserve_address: String,

    /// Blocks subtracted from the best head before a block is considered
    /// safe to process
    pub finality_depth: u64,

    /// First block the monitor is responsible for
    pub first_block: u64,

    /// Chain token decimals (base units per token = 10^decimals)
    pub token_decimals: u32,

    /// Upper bound for one block's processing, milliseconds
    pub block_timeout_ms: u64,

    /// Upper bound for acquiring the processing lock, milliseconds
    pub lock_timeout_ms: u64,

    /// Estimated burn transaction fee, base units
    pub burn_fee: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            reserve_address: String::new(),
            finality_depth: 10,
            first_block: 1,
            token_decimals: 10,
            block_timeout_ms: 60_000,
            lock_timeout_ms: 10_000,
            burn_fee: 0,
        }
    }
}

impl MonitorConfig {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("Failed to read config: {}", e)))?;
        let config: MonitorConfig = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = MonitorConfig::default();

        if let Ok(address) = std::env::var("MONITOR_RESERVE_ADDRESS") {
            config.reserve_address = address;
        }

        if let Ok(depth) = std::env::var("MONITOR_FINALITY_DEPTH") {
            config.finality_depth = depth
                .parse()
                .map_err(|e| crate::Error::Config(format!("Invalid MONITOR_FINALITY_DEPTH: {}", e)))?;
        }

        if let Ok(first) = std::env::var("MONITOR_FIRST_BLOCK") {
            config.first_block = first
                .parse()
                .map_err(|e| crate::Error::Config(format!("Invalid MONITOR_FIRST_BLOCK: {}", e)))?;
        }

        if let Ok(decimals) = std::env::var("MONITOR_TOKEN_DECIMALS") {
            config.token_decimals = decimals
                .parse()
                .map_err(|e| crate::Error::Config(format!("Invalid MONITOR_TOKEN_DECIMALS: {}", e)))?;
        }

        if let Ok(fee) = std::env::var("MONITOR_BURN_FEE") {
            config.burn_fee = fee
                .parse()
                .map_err(|e| crate::Error::Config(format!("Invalid MONITOR_BURN_FEE: {}", e)))?;
        }

        Ok(config)
    }
}
