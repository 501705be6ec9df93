//! End-to-end mining: pool notifications drive the controller, mined blocks
//! go to the network and back through local block handling.

use ledger_consensus::chain::GENESIS_PARENT;
use ledger_consensus::identity::NodeIdentity;
use ledger_consensus::mining::{assemble_candidate, search_nonce};
use ledger_consensus::script::Secp256k1Verifier;
use ledger_consensus::*;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct Broadcast {
    blocks: Mutex<Vec<Block>>,
}

impl NetworkSend for Broadcast {
    fn send_block(&self, block: &Block) {
        self.blocks.lock().push(block.clone());
    }
}

struct Harness {
    chain: Arc<MemoryChain>,
    pool: Arc<MemoryPool>,
    node: Arc<LocalNode>,
    broadcast: Arc<Broadcast>,
    alice: NodeIdentity,
    genesis: Block,
    miner: Option<Miner>,
    handle: MinerHandle,
}

/// Node whose miner searches against `miner_target`; genesis is mined
/// against an easy target beforehand.
fn harness(miner_target: Target) -> anyhow::Result<Harness> {
    let config = ConsensusConfig {
        initial_difficulty_target: miner_target.to_hex(),
        ..Default::default()
    };
    config.validate()?;

    let chain = Arc::new(MemoryChain::new());
    let pool = Arc::new(MemoryPool::new(1, 50));
    let validator =
        Validator::new(config.clone(), chain.clone(), Arc::new(Secp256k1Verifier::new()));
    let node = Arc::new(LocalNode::new(validator, pool.clone()));
    let broadcast = Arc::new(Broadcast::default());
    let miner_identity = Arc::new(NodeIdentity::from_seed(b"miner")?);
    let alice = NodeIdentity::from_seed(b"alice")?;

    // genesis funds alice
    let coinbase = Transaction {
        version: 0,
        inputs: vec![],
        outputs: vec![TransactionOutput { amount: 100, locking_script: alice.locking_script() }],
        lock_time: 0,
    };
    let target = Target::from_leading_zero_bits(8);
    let mut genesis = assemble_candidate(GENESIS_PARENT, coinbase, &[], &target, 0, 0)?;
    anyhow::ensure!(
        search_nonce(&mut genesis, &target, u32::MAX, &CancellationToken::new()),
        "no nonce for genesis"
    );
    anyhow::ensure!(node.handle_block(genesis.clone()), "genesis rejected");

    let (miner, handle) = Miner::new(
        config,
        Collaborators {
            chain: chain.clone(),
            pool: pool.clone(),
            identity: miner_identity,
            network: broadcast.clone(),
            acceptor: node.clone(),
        },
    )?;
    pool.set_listener(Arc::new(handle.clone()));

    Ok(Harness { chain, pool, node, broadcast, alice, genesis, miner: Some(miner), handle })
}

impl Harness {
    fn spend_genesis(&self, keep: Amount) -> anyhow::Result<Transaction> {
        let funding = &self.genesis.transactions[0];
        let prevout = OutPoint { hash: funding.id(), index: 0 };
        Ok(Transaction {
            version: 0,
            inputs: vec![self.alice.spend(prevout, &funding.outputs[0])?],
            outputs: vec![TransactionOutput { amount: keep, locking_script: vec![0xee; 20] }],
            lock_time: 0,
        })
    }

    async fn wait_for(
        &self,
        predicate: impl FnMut(&MinerStatus) -> bool,
    ) -> anyhow::Result<MinerStatus> {
        let mut rx = self.handle.subscribe();
        let status = timeout(Duration::from_secs(30), rx.wait_for(predicate)).await??;
        Ok(status.clone())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_pool_change_mines_and_commits_block() -> anyhow::Result<()> {
    let mut h = harness(Target::from_leading_zero_bits(8))?;
    let task = h.miner.take().ok_or_else(|| anyhow::anyhow!("miner taken"))?.spawn();

    h.handle.set_active(true)?;
    let tx = h.spend_genesis(93)?;
    assert!(h.node.submit_transaction(tx.clone()));

    let status = h.wait_for(|s| s.blocks_mined == 1).await?;
    assert_eq!(status.pool_snapshot, vec![tx.id()]);

    // acceptance prunes the pool, which notifies the miner, which goes idle
    let status = h.wait_for(|s| !s.mining && h.pool.is_empty()).await?;
    assert_eq!(status.blocks_mined, 1);

    h.handle.shutdown()?;
    timeout(Duration::from_secs(30), task).await??;

    let sent = h.broadcast.blocks.lock().clone();
    assert_eq!(sent.len(), 1);
    let mined = &sent[0];
    assert_eq!(h.chain.tip_hash(), mined.hash());
    assert_eq!(h.chain.current_height(), 2);
    assert_eq!(mined.header.prev_block_hash, h.genesis.hash());
    assert_eq!(mined.transactions[1], tx);
    // fee 7 plus the subsidy at height 1
    assert_eq!(mined.transactions[0].outputs[0].amount, 7 + INITIAL_SUBSIDY);
    assert!(h.pool.is_empty());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_pool_change_cancels_attempt() -> anyhow::Result<()> {
    // 255 zero bits: the search never succeeds
    let mut h = harness(Target::from_leading_zero_bits(255))?;
    let task = h.miner.take().ok_or_else(|| anyhow::anyhow!("miner taken"))?.spawn();

    h.handle.set_active(true)?;
    assert!(h.node.submit_transaction(h.spend_genesis(90)?));
    h.wait_for(|s| s.attempts_started == 1 && s.mining).await?;

    // dropping the pending transaction makes the candidate stale
    assert!(h.pool.remove(&h.pool.select_for_mining()[0].id()));
    let status = h.wait_for(|s| s.attempts_cancelled == 1).await?;
    assert!(!status.mining);
    assert_eq!(status.attempts_started, 1);

    h.handle.shutdown()?;
    timeout(Duration::from_secs(30), task).await??;
    assert!(h.broadcast.blocks.lock().is_empty());
    assert_eq!(h.chain.current_height(), 1);
    Ok(())
}

#[tokio::test]
async fn test_rejected_transaction_never_reaches_miner() -> anyhow::Result<()> {
    let mut h = harness(Target::from_leading_zero_bits(8))?;
    let task = h.miner.take().ok_or_else(|| anyhow::anyhow!("miner taken"))?.spawn();
    h.handle.set_active(true)?;

    // outputs exceed inputs
    assert!(!h.node.submit_transaction(h.spend_genesis(150)?));
    h.handle.shutdown()?;
    timeout(Duration::from_secs(30), task).await??;

    assert_eq!(h.handle.status().attempts_started, 0);
    assert!(h.broadcast.blocks.lock().is_empty());
    Ok(())
}
