//! Block and transaction validation against an in-memory chain

use ledger_consensus::chain::GENESIS_PARENT;
use ledger_consensus::identity::NodeIdentity;
use ledger_consensus::mining::{assemble_candidate, build_coinbase, search_nonce};
use ledger_consensus::script::Secp256k1Verifier;
use ledger_consensus::*;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

struct Ledger {
    chain: Arc<MemoryChain>,
    validator: Validator,
    config: ConsensusConfig,
    alice: NodeIdentity,
    genesis: Block,
}

/// Chain whose genesis coinbase pays 100 to alice in output 0 and 50 in output 1
fn ledger() -> anyhow::Result<Ledger> {
    let config = ConsensusConfig {
        initial_difficulty_target: Target::from_leading_zero_bits(4).to_hex(),
        ..Default::default()
    };
    let chain = Arc::new(MemoryChain::new());
    let validator = Validator::new(config.clone(), chain.clone(), Arc::new(Secp256k1Verifier::new()));
    let alice = NodeIdentity::from_seed(b"alice")?;

    let coinbase = Transaction {
        version: 0,
        inputs: vec![],
        outputs: vec![
            TransactionOutput { amount: 100, locking_script: alice.locking_script() },
            TransactionOutput { amount: 50, locking_script: alice.locking_script() },
        ],
        lock_time: 0,
    };
    let genesis = mine(assemble_candidate(GENESIS_PARENT, coinbase, &[], &config.difficulty_target()?, 0, 0)?);
    anyhow::ensure!(validator.check_block(&genesis), "genesis rejected");
    chain.accept_block(&genesis)?;

    Ok(Ledger { chain, validator, config, alice, genesis })
}

fn mine(mut block: Block) -> Block {
    let target = Target::from_bytes(block.header.difficulty_target);
    assert!(search_nonce(&mut block, &target, 1 << 20, &CancellationToken::new()));
    block
}

impl Ledger {
    fn spend(&self, index: u32, outputs: &[Amount]) -> anyhow::Result<Transaction> {
        let funding = &self.genesis.transactions[0];
        let prevout = OutPoint { hash: funding.id(), index };
        Ok(Transaction {
            version: 0,
            inputs: vec![self.alice.spend(prevout, &funding.outputs[index as usize])?],
            outputs: outputs
                .iter()
                .map(|&amount| TransactionOutput { amount, locking_script: vec![0xbb; 20] })
                .collect(),
            lock_time: 0,
        })
    }

    fn block_with(&self, txs: &[Transaction]) -> anyhow::Result<Block> {
        let coinbase =
            build_coinbase(txs, self.chain.current_height(), &[0xcc; 20], &self.config)?;
        Ok(mine(assemble_candidate(
            self.chain.tip_hash(),
            coinbase,
            txs,
            &self.config.difficulty_target()?,
            0,
            1,
        )?))
    }
}

#[test]
fn test_coinbase_amount_is_fees_plus_reward() -> anyhow::Result<()> {
    let ledger = ledger()?;
    let a = ledger.spend(0, &[97])?;
    let b = ledger.spend(1, &[45])?;
    let config = ConsensusConfig {
        initial_subsidy: 100,
        halving_interval: 10,
        max_halvings: 2,
        ..Default::default()
    };
    let coinbase = build_coinbase(&[a, b], 0, &[1; 20], &config)?;
    assert_eq!(coinbase.outputs[0].amount, 3 + 5 + 100);
    Ok(())
}

#[test]
fn test_mined_block_with_spends_is_valid() -> anyhow::Result<()> {
    let ledger = ledger()?;
    let a = ledger.spend(0, &[97])?;
    let b = ledger.spend(1, &[45])?;
    assert!(ledger.validator.check_transaction(&a));
    assert!(ledger.validator.check_transaction(&b));

    let block = ledger.block_with(&[a, b])?;
    assert_eq!(block.transactions[0].outputs[0].amount, 8 + INITIAL_SUBSIDY);
    assert!(ledger.validator.check_block(&block));
    Ok(())
}

#[test]
fn test_double_spend_within_block_rejected() -> anyhow::Result<()> {
    let ledger = ledger()?;
    let first = ledger.spend(0, &[90])?;
    let second = ledger.spend(0, &[80])?;

    // each passes on its own
    assert!(ledger.validator.check_transaction(&first));
    assert!(ledger.validator.check_transaction(&second));

    let block = ledger.block_with(&[first, second])?;
    assert!(!ledger.validator.check_block(&block));
    Ok(())
}

#[test]
fn test_spent_output_unavailable_after_acceptance() -> anyhow::Result<()> {
    let ledger = ledger()?;
    let tx = ledger.spend(0, &[90])?;
    assert!(ledger.validator.check_transaction(&tx));

    let block = ledger.block_with(&[tx.clone()])?;
    assert!(ledger.validator.check_block(&block));
    ledger.chain.accept_block(&block)?;

    assert!(!ledger.validator.check_transaction(&tx));
    let replay = ledger.block_with(&[tx])?;
    assert!(!ledger.validator.check_block(&replay));

    // the untouched output is still spendable
    assert!(ledger.validator.check_transaction(&ledger.spend(1, &[40])?));
    Ok(())
}

#[test]
fn test_first_transaction_must_be_coinbase() -> anyhow::Result<()> {
    let ledger = ledger()?;
    let tx = ledger.spend(0, &[90])?;
    let mut block = ledger.block_with(&[tx.clone()])?;
    block.transactions.swap(0, 1);
    block = mine(block);
    assert!(matches!(
        ledger.validator.validate_block(&block),
        ValidationResult::Invalid(reason) if reason.contains("coinbase")
    ));
    Ok(())
}

#[test]
fn test_value_creation_rejected() -> anyhow::Result<()> {
    let ledger = ledger()?;
    // validly unlocked, every output positive, but nothing left as fee
    assert!(!ledger.validator.check_transaction(&ledger.spend(0, &[60, 40])?));
    assert!(!ledger.validator.check_transaction(&ledger.spend(0, &[60, 41])?));
    assert!(ledger.validator.check_transaction(&ledger.spend(0, &[60, 39])?));
    Ok(())
}

#[test]
fn test_block_rejects_spend_without_valid_unlock() -> anyhow::Result<()> {
    let ledger = ledger()?;
    let mut unsigned = ledger.spend(0, &[90])?;
    unsigned.inputs[0].unlocking_script.clear();
    assert!(!ledger.validator.check_transaction(&unsigned));
    assert!(!ledger.validator.check_block(&ledger.block_with(&[unsigned])?));

    // bob's key cannot open alice's output
    let bob = NodeIdentity::from_seed(b"bob")?;
    let mut forged = ledger.spend(1, &[45])?;
    let funding = &ledger.genesis.transactions[0];
    let prevout = forged.inputs[0].prevout;
    forged.inputs[0] = bob.spend(prevout, &funding.outputs[1])?;
    assert!(!ledger.validator.check_block(&ledger.block_with(&[forged])?));
    Ok(())
}

#[test]
fn test_block_rejects_value_creating_spend() -> anyhow::Result<()> {
    let ledger = ledger()?;
    let honest = ledger.spend(1, &[45])?;
    let inflated = ledger.spend(0, &[60, 40])?;
    let coinbase = build_coinbase(
        &[honest.clone()],
        ledger.chain.current_height(),
        &[0xcc; 20],
        &ledger.config,
    )?;
    let block = mine(assemble_candidate(
        ledger.chain.tip_hash(),
        coinbase,
        &[honest, inflated],
        &ledger.config.difficulty_target()?,
        0,
        1,
    )?);
    assert!(matches!(
        ledger.validator.validate_block(&block),
        ValidationResult::Invalid(reason) if reason.starts_with("Transaction 2")
    ));
    Ok(())
}

#[test]
fn test_repeated_coinbase_cannot_erase_unspent_reward() -> anyhow::Result<()> {
    let ledger = ledger()?;
    let first = ledger.block_with(&[ledger.spend(0, &[97])?])?;
    assert!(ledger.validator.check_block(&first));
    ledger.chain.accept_block(&first)?;

    // same payee, same fee, same halving epoch: the coinbase id repeats
    let second = ledger.block_with(&[ledger.spend(1, &[47])?])?;
    assert_eq!(second.transactions[0].id(), first.transactions[0].id());
    assert!(!ledger.validator.check_block(&second));
    assert!(ledger.chain.accept_block(&second).is_err());

    let total: Amount = ledger.chain.utxo_set().values().map(|output| output.amount).sum();
    assert_eq!(total, 97 + 50 + 3 + INITIAL_SUBSIDY);
    Ok(())
}

#[test]
fn test_block_on_side_branch_checked_against_its_branch() -> anyhow::Result<()> {
    let ledger = ledger()?;
    let tx = ledger.spend(0, &[90])?;
    let main = ledger.block_with(&[tx.clone()])?;
    ledger.chain.accept_block(&main)?;

    // a rival block on genesis may still spend the same output
    let coinbase = build_coinbase(&[tx.clone()], 1, &[0xdd; 20], &ledger.config)?;
    let rival = mine(assemble_candidate(
        ledger.genesis.hash(),
        coinbase,
        &[tx],
        &ledger.config.difficulty_target()?,
        0,
        2,
    )?);
    assert!(ledger.validator.check_block(&rival));
    Ok(())
}

#[test]
fn test_tampered_nonce_fails_pow() -> anyhow::Result<()> {
    let ledger = ledger()?;
    let mut block = ledger.block_with(&[ledger.spend(0, &[90])?])?;
    let target = Target::from_bytes(block.header.difficulty_target);
    while target.is_met_by(&block.hash()) {
        block.header.nonce = block.header.nonce.wrapping_add(1);
    }
    assert!(!ledger.validator.check_block(&block));
    Ok(())
}
