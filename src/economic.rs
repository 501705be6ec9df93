//! Economic model: block subsidy schedule and fees

use crate::config::ConsensusConfig;
use crate::constants::SUBSIDY_SHIFT_LIMIT;
use crate::error::{ConsensusError, Result};
use crate::types::*;

/// Block subsidy at `height`.
///
/// halvings = ⌊height / halving_interval⌋; the subsidy is
/// ⌊initial_subsidy / 2^halvings⌋ until `halvings` exceeds `max_halvings`,
/// then 0. Integer arithmetic only: this must agree bit-for-bit across nodes.
/// A zero `halving_interval` never halves.
pub fn block_reward(
    height: Height,
    initial_subsidy: Amount,
    halving_interval: Height,
    max_halvings: u64,
) -> Amount {
    let halvings = match height.checked_div(halving_interval) {
        Some(halvings) => halvings,
        None => return initial_subsidy,
    };

    if halvings > max_halvings || halvings >= SUBSIDY_SHIFT_LIMIT {
        return 0;
    }

    initial_subsidy >> halvings
}

/// Subsidy parameters taken from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewardSchedule {
    pub initial_subsidy: Amount,
    pub halving_interval: Height,
    pub max_halvings: u64,
}

impl RewardSchedule {
    pub fn new(initial_subsidy: Amount, halving_interval: Height, max_halvings: u64) -> Self {
        Self { initial_subsidy, halving_interval, max_halvings }
    }

    pub fn from_config(config: &ConsensusConfig) -> Self {
        Self::new(config.initial_subsidy, config.halving_interval, config.max_halvings)
    }

    pub fn reward_at(&self, height: Height) -> Amount {
        block_reward(height, self.initial_subsidy, self.halving_interval, self.max_halvings)
    }

    /// First height paying no subsidy, `None` if the subsidy never runs out
    pub fn exhaustion_height(&self) -> Option<Height> {
        if self.halving_interval == 0 {
            return if self.initial_subsidy == 0 { Some(0) } else { None };
        }
        let epochs = self.max_halvings.saturating_add(1).min(SUBSIDY_SHIFT_LIMIT);
        Some(epochs.saturating_mul(self.halving_interval))
    }

    /// Cumulative subsidy paid by heights `0..=height`.
    ///
    /// Summed per halving epoch rather than per block.
    pub fn total_supply(&self, height: Height) -> u128 {
        if self.halving_interval == 0 {
            return (height as u128 + 1) * self.initial_subsidy as u128;
        }

        let mut total = 0u128;
        let mut epoch = 0u64;
        loop {
            let start = match epoch.checked_mul(self.halving_interval) {
                Some(start) if start <= height => start,
                _ => break,
            };
            let reward = self.reward_at(start);
            if reward == 0 {
                break;
            }
            let end = start
                .saturating_add(self.halving_interval - 1)
                .min(height);
            total += (end - start + 1) as u128 * reward as u128;
            epoch += 1;
        }
        total
    }
}

/// Transaction fee: sum of inputs minus sum of outputs.
///
/// Coinbase transactions pay no fee; a non-positive fee means the transaction
/// creates value and is rejected.
pub fn calculate_fee(tx: &Transaction) -> Result<Amount> {
    if tx.inputs.is_empty() {
        return Err(ConsensusError::EconomicValidation(
            "Transaction has no inputs".to_string(),
        ));
    }

    let total_input = tx
        .sum_inputs()
        .ok_or_else(|| ConsensusError::EconomicValidation("Input sum overflows".to_string()))?;
    let total_output = tx
        .sum_outputs()
        .ok_or_else(|| ConsensusError::EconomicValidation("Output sum overflows".to_string()))?;

    match total_input.checked_sub(total_output) {
        Some(fee) if fee > 0 => Ok(fee),
        _ => Err(ConsensusError::EconomicValidation(format!(
            "Non-positive fee: inputs {} outputs {}",
            total_input, total_output
        ))),
    }
}
