//! Consensus configuration
//!
//! Every field has a protocol default (see `constants`), so a JSON document
//! only needs to name the options it overrides.

use crate::constants::*;
use crate::error::{ConsensusError, Result};
use crate::pow::Target;
use crate::types::{Amount, Height};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusConfig {
    /// Version written into coinbase transactions
    pub version: u32,
    /// Lock time written into coinbase transactions
    pub default_lock_time: u32,
    pub initial_subsidy: Amount,
    pub halving_interval: Height,
    pub max_halvings: u64,
    /// Inclusive upper bound on encoded block and transaction size
    pub max_block_size: usize,
    /// Big-endian 256-bit target as 64 hex characters
    pub initial_difficulty_target: String,
    /// Nonces tried per mining attempt
    pub nonce_limit: u32,
    /// Cancel an in-flight search as soon as mining is switched off
    pub cancel_on_deactivate: bool,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            version: DEFAULT_VERSION,
            default_lock_time: DEFAULT_LOCK_TIME,
            initial_subsidy: INITIAL_SUBSIDY,
            halving_interval: HALVING_INTERVAL,
            max_halvings: MAX_HALVINGS,
            max_block_size: MAX_BLOCK_SIZE,
            initial_difficulty_target: INITIAL_DIFFICULTY_TARGET.to_string(),
            nonce_limit: NONCE_LIMIT,
            cancel_on_deactivate: true,
        }
    }
}

impl ConsensusConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: ConsensusConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parsed difficulty target
    pub fn difficulty_target(&self) -> Result<Target> {
        Target::from_hex(&self.initial_difficulty_target)
    }

    pub fn validate(&self) -> Result<()> {
        if self.halving_interval == 0 {
            return Err(ConsensusError::Config(
                "halving_interval must be positive".to_string(),
            ));
        }
        if self.nonce_limit == 0 {
            return Err(ConsensusError::Config("nonce_limit must be positive".to_string()));
        }
        if self.max_block_size == 0 {
            return Err(ConsensusError::Config(
                "max_block_size must be positive".to_string(),
            ));
        }
        if self.difficulty_target()?.is_zero() {
            return Err(ConsensusError::Config(
                "difficulty target of zero can never be met".to_string(),
            ));
        }
        Ok(())
    }
}
