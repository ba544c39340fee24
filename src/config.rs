//! Ledger configuration

use serde::{Deserialize, Serialize};
use thiserror::Error;

use std::fs;
use std::path::Path;

use crate::blockchain::pow::MiningStrategy;

/// Longest zero prefix a SHA-256 hex digest can have
pub const MAX_DIFFICULTY: usize = 64;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Settings fixed for the lifetime of a ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Leading zero hex characters required in a mined block hash
    #[serde(default = "default_difficulty")]
    pub difficulty: usize,

    /// Amount credited to the miner of each block
    #[serde(default = "default_mining_reward")]
    pub mining_reward: f64,

    #[serde(default)]
    pub mining: MiningStrategy,
}

fn default_difficulty() -> usize {
    2
}

fn default_mining_reward() -> f64 {
    100.0
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: default_difficulty(),
            mining_reward: default_mining_reward(),
            mining: MiningStrategy::default(),
        }
    }
}

impl LedgerConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: LedgerConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.difficulty > MAX_DIFFICULTY {
            return Err(ConfigError::Invalid(format!(
                "difficulty {} exceeds the maximum of {}",
                self.difficulty, MAX_DIFFICULTY
            )));
        }

        if !self.mining_reward.is_finite() || self.mining_reward <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "mining reward must be positive, got {}",
                self.mining_reward
            )));
        }

        if let MiningStrategy::Parallel { batch_size: 0 } = self.mining {
            return Err(ConfigError::Invalid(
                "parallel batch size must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}
