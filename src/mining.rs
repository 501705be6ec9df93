//! Block assembly and proof-of-work search

use crate::config::ConsensusConfig;
use crate::economic::{calculate_fee, RewardSchedule};
use crate::encoding::merkle_root;
use crate::error::{ConsensusError, Result};
use crate::pow::{hash_meets_target, Target};
use crate::types::*;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// BuildCoinbase: 𝒯𝒳* × ℕ × payee → 𝒯𝒳
///
/// 1. Refuse an empty pool
/// 2. Sum the fee of every pending transaction (sum of inputs − sum of outputs)
/// 3. Add the subsidy for `chain_height`
/// 4. Pay the total to `payee` in a single output with no inputs
///
/// A pending transaction whose fee is not positive makes the pool malformed.
pub fn build_coinbase(
    pending: &[Transaction],
    chain_height: Height,
    payee: &[u8],
    config: &ConsensusConfig,
) -> Result<Transaction> {
    if pending.is_empty() {
        return Err(ConsensusError::MalformedPool("no pending transactions".to_string()));
    }

    let mut total_fees: Amount = 0;
    for (i, tx) in pending.iter().enumerate() {
        let fee = calculate_fee(tx).map_err(|e| {
            ConsensusError::MalformedPool(format!("pending transaction {}: {}", i, e))
        })?;
        total_fees = total_fees
            .checked_add(fee)
            .ok_or_else(|| ConsensusError::MalformedPool("total fees overflow".to_string()))?;
    }

    let reward = RewardSchedule::from_config(config).reward_at(chain_height);
    let amount = total_fees
        .checked_add(reward)
        .ok_or_else(|| ConsensusError::MalformedPool("coinbase amount overflow".to_string()))?;

    Ok(Transaction {
        version: config.version,
        inputs: vec![],
        outputs: vec![TransactionOutput { amount, locking_script: payee.to_vec() }],
        lock_time: config.default_lock_time,
    })
}

/// AssembleCandidate: coinbase first, then the selected transactions, with
/// the merkle root committed and the nonce at 0.
pub fn assemble_candidate(
    prev_block_hash: Hash,
    coinbase: Transaction,
    selected: &[Transaction],
    target: &Target,
    version: u32,
    timestamp: u64,
) -> Result<Block> {
    let mut transactions = Vec::with_capacity(selected.len() + 1);
    transactions.push(coinbase);
    transactions.extend_from_slice(selected);

    let header = BlockHeader {
        version,
        prev_block_hash,
        merkle_root: merkle_root(&transactions)?,
        timestamp,
        difficulty_target: *target.as_bytes(),
        nonce: 0,
    };

    Ok(Block { header, transactions })
}

/// SearchNonce: ℬ × target × ℕ × cancel → {found, not found}
///
/// Tries nonces `0..nonce_limit` in increasing order, checking `cancel`
/// before each one. On success the header keeps the winning nonce; otherwise
/// it holds the last nonce tried (or 0 if cancelled before the first).
pub fn search_nonce(
    block: &mut Block,
    target: &Target,
    nonce_limit: u32,
    cancel: &CancellationToken,
) -> bool {
    for nonce in 0..nonce_limit {
        if cancel.is_cancelled() {
            trace!(nonce, "Nonce search cancelled");
            return false;
        }

        block.header.nonce = nonce;
        if hash_meets_target(&block.header, target) {
            return true;
        }
    }
    false
}

/// Seconds since the Unix epoch, 0 if the clock is before it
pub fn current_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
