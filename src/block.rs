//! Block validation

use crate::chain::{apply_transactions, ChainView};
use crate::pow::satisfies_pow;
use crate::script::UnlockVerifier;
use crate::transaction::check_transaction_in;
use crate::types::*;

/// CheckBlock: ℬ → {valid, invalid}
///
/// For block b = (h, txs):
/// 1. |txs| > 0 and Σ txs[0].outs > 0
/// 2. txs[0] has no inputs (coinbase shape)
/// 3. |b| ≤ max_size
/// 4. hash(h) < h.difficulty_target
/// 5. txs only spend outputs unspent on the branch ending at
///    h.prev_block_hash, each at most once
/// 6. ∀tx ∈ txs[1..]: CheckTransaction(tx) against that branch, with the
///    outputs of earlier transactions in the block already available
pub fn check_block(
    block: &Block,
    chain: &dyn ChainView,
    verifier: &dyn UnlockVerifier,
    max_size: usize,
) -> ValidationResult {
    // 1. Non-empty, paying coinbase
    let first = match block.coinbase() {
        Some(first) => first,
        None => return ValidationResult::Invalid("Block has no transactions".to_string()),
    };
    match first.sum_outputs() {
        Some(total) if total > 0 => {}
        _ => {
            return ValidationResult::Invalid(
                "First transaction pays nothing".to_string(),
            )
        }
    }

    // 2. Coinbase first
    if !first.inputs.is_empty() {
        return ValidationResult::Invalid("First transaction is not a coinbase".to_string());
    }

    // 3. Size
    let size = block.size();
    if size > max_size {
        return ValidationResult::Invalid(format!("Block too large: {} bytes", size));
    }

    // 4. Proof of work
    if !satisfies_pow(&block.header) {
        return ValidationResult::Invalid("Block hash does not meet its target".to_string());
    }

    // 5. UTXO availability on the block's branch
    if !chain.check_utxo_across_branches(&block.transactions, &block.header.prev_block_hash) {
        return ValidationResult::Invalid(
            "Block spends outputs unavailable on its branch".to_string(),
        );
    }

    // 6. Every spend is a valid transaction on that branch
    let mut utxo_set = match chain.branch_utxo_set(&block.header.prev_block_hash) {
        Some(utxo_set) => utxo_set,
        None => return ValidationResult::Invalid("Unknown parent block".to_string()),
    };
    for (i, tx) in block.transactions.iter().enumerate() {
        if i > 0 {
            if let ValidationResult::Invalid(reason) =
                check_transaction_in(tx, &utxo_set, verifier, max_size)
            {
                return ValidationResult::Invalid(format!("Transaction {}: {}", i, reason));
            }
        }
        if !apply_transactions(std::slice::from_ref(tx), &mut utxo_set) {
            return ValidationResult::Invalid(format!("Transaction {} does not apply", i));
        }
    }

    ValidationResult::Valid
}
