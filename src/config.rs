//! Configuration management for Pactchain

use crate::error::{ChainError, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub escrow: EscrowConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    /// Coinbase reward before any halving.
    #[serde(default = "default_base_reward")]
    pub base_reward: f64,
    /// Blocks between halvings of the base reward.
    #[serde(default = "default_halving_blocks")]
    pub halving_blocks: u64,
    /// Mempool transactions selected per block, coinbase excluded.
    #[serde(default = "default_max_block_txs")]
    pub max_block_txs: usize,
    /// Starting balance credited when a new key is registered.
    #[serde(default = "default_faucet_amount")]
    pub faucet_amount: f64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            base_reward: default_base_reward(),
            halving_blocks: default_halving_blocks(),
            max_block_txs: default_max_block_txs(),
            faucet_amount: default_faucet_amount(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EscrowConfig {
    /// Fraction of the escrow amount paid to the mediator on completion.
    #[serde(default = "default_mediator_rate")]
    pub mediator_rate: f64,
    /// Fraction of the escrow amount attached as the deposit's mining fee.
    #[serde(default = "default_initial_fee_rate")]
    pub initial_fee_rate: f64,
    /// Flat mining fee carried by each payout transfer; two are reserved.
    #[serde(default = "default_release_fee")]
    pub release_fee: f64,
    /// Blocks after creation before a stalled agreement is refunded.
    #[serde(default = "default_timeout_blocks")]
    pub timeout_blocks: u64,
}

impl Default for EscrowConfig {
    fn default() -> Self {
        Self {
            mediator_rate: default_mediator_rate(),
            initial_fee_rate: default_initial_fee_rate(),
            release_fee: default_release_fee(),
            timeout_blocks: default_timeout_blocks(),
        }
    }
}

fn default_base_reward() -> f64 {
    10.0
}

fn default_halving_blocks() -> u64 {
    100
}

fn default_max_block_txs() -> usize {
    3
}

fn default_faucet_amount() -> f64 {
    10.0
}

fn default_mediator_rate() -> f64 {
    0.02
}

fn default_initial_fee_rate() -> f64 {
    0.01
}

fn default_release_fee() -> f64 {
    0.1
}

fn default_timeout_blocks() -> u64 {
    100
}

/// Load configuration from a TOML file. A missing or empty file yields the
/// defaults; a present but malformed file is an error.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config> {
    let config_str = fs::read_to_string(path).unwrap_or_default();
    let config: Config = if config_str.is_empty() {
        Config::default()
    } else {
        toml::from_str(&config_str).map_err(|e| ChainError::Config(e.to_string()))?
    };
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.chain.base_reward <= 0.0 {
        return Err(ChainError::Config(
            "chain.base_reward must be positive".to_string(),
        ));
    }
    if config.chain.halving_blocks == 0 {
        return Err(ChainError::Config(
            "chain.halving_blocks must be at least 1".to_string(),
        ));
    }
    if config.chain.max_block_txs == 0 {
        return Err(ChainError::Config(
            "chain.max_block_txs must be at least 1".to_string(),
        ));
    }
    if config.chain.faucet_amount < 0.0 {
        return Err(ChainError::Config(
            "chain.faucet_amount cannot be negative".to_string(),
        ));
    }
    if config.escrow.mediator_rate < 0.0 || config.escrow.initial_fee_rate < 0.0 {
        return Err(ChainError::Config(
            "escrow rates cannot be negative".to_string(),
        ));
    }
    if config.escrow.release_fee < 0.0 {
        return Err(ChainError::Config(
            "escrow.release_fee cannot be negative".to_string(),
        ));
    }
    if config.escrow.timeout_blocks == 0 {
        return Err(ChainError::Config(
            "escrow.timeout_blocks must be at least 1".to_string(),
        ));
    }
    Ok(())
}
