//! Transaction validation against the main-chain UTXO set, or against a
//! branch snapshot when checking the transactions of a block

use crate::chain::ChainView;
use crate::script::UnlockVerifier;
use crate::types::*;
use std::collections::HashSet;

/// CheckTransaction: 𝒯𝒳 × 𝒰𝒮 → {valid, invalid}
///
/// A transaction tx = (v, ins, outs, lt) is valid if and only if:
/// 1. |ins| > 0 ∧ |outs| > 0
/// 2. Σ ins.amount > Σ outs.amount
/// 3. |tx| ≤ max_size
/// 4. ∀i ∈ ins: i.prevout is unspent, referenced once, carries the amount of
///    the output it spends, and i's unlocking proof opens that output
/// 5. ∀o ∈ outs: o.amount > 0
///
/// Checks run in that order and stop at the first failure.
pub fn check_transaction(
    tx: &Transaction,
    chain: &dyn ChainView,
    verifier: &dyn UnlockVerifier,
    max_size: usize,
) -> ValidationResult {
    check_with(tx, verifier, max_size, |input| {
        if chain.is_double_spend(input) {
            return Err("double spends");
        }
        chain.get_unspent_output(input).ok_or("references no unspent output")
    })
}

/// CheckTransaction against an explicit UTXO set, such as the snapshot of the
/// branch a block extends. A missing outpoint counts as a double spend.
pub fn check_transaction_in(
    tx: &Transaction,
    utxo_set: &UtxoSet,
    verifier: &dyn UnlockVerifier,
    max_size: usize,
) -> ValidationResult {
    check_with(tx, verifier, max_size, |input| {
        utxo_set.get(&input.prevout).cloned().ok_or("double spends")
    })
}

fn check_with<F>(
    tx: &Transaction,
    verifier: &dyn UnlockVerifier,
    max_size: usize,
    lookup: F,
) -> ValidationResult
where
    F: Fn(&TransactionInput) -> std::result::Result<TransactionOutput, &'static str>,
{
    // 1. Inputs and outputs present
    if tx.inputs.is_empty() || tx.outputs.is_empty() {
        return ValidationResult::Invalid("Empty inputs or outputs".to_string());
    }

    // 2. No value created
    let (total_in, total_out) = match (tx.sum_inputs(), tx.sum_outputs()) {
        (Some(total_in), Some(total_out)) => (total_in, total_out),
        _ => return ValidationResult::Invalid("Amount sum overflows".to_string()),
    };
    if total_in <= total_out {
        return ValidationResult::Invalid(format!(
            "Inputs {} do not exceed outputs {}",
            total_in, total_out
        ));
    }

    // 3. Size
    let size = tx.size();
    if size > max_size {
        return ValidationResult::Invalid(format!("Transaction too large: {} bytes", size));
    }

    // 4. Inputs
    let mut seen = HashSet::with_capacity(tx.inputs.len());
    for (i, input) in tx.inputs.iter().enumerate() {
        if !seen.insert(input.prevout) {
            return ValidationResult::Invalid(format!("Input {} repeats an outpoint", i));
        }
        let output = match lookup(input) {
            Ok(output) => output,
            Err(reason) => return ValidationResult::Invalid(format!("Input {} {}", i, reason)),
        };
        if input.amount != output.amount {
            return ValidationResult::Invalid(format!(
                "Input {} declares {} but the output holds {}",
                i, input.amount, output.amount
            ));
        }
        if !verifier.is_unlocked(&input.prevout, &output, &input.unlocking_script) {
            return ValidationResult::Invalid(format!("Input {} fails to unlock its output", i));
        }
    }

    // 5. Outputs
    for (i, output) in tx.outputs.iter().enumerate() {
        if output.amount == 0 {
            return ValidationResult::Invalid(format!("Output {} has zero amount", i));
        }
    }

    ValidationResult::Valid
}
