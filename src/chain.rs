//! Chain collaborator: read access to the UTXO set per branch and the block
//! acceptance entry point that commits UTXO mutations.

use crate::encoding::transaction_id;
use crate::error::{ConsensusError, Result};
use crate::types::*;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::{debug, info};

/// Previous-hash value of a genesis block
pub const GENESIS_PARENT: Hash = [0u8; 32];

/// What the consensus core needs from the chain
pub trait ChainView: Send + Sync {
    /// Number of blocks on the main chain (0 when empty)
    fn current_height(&self) -> Height;

    /// Hash of the main-chain tip, `GENESIS_PARENT` when empty
    fn tip_hash(&self) -> Hash;

    /// Unspent output referenced by `input` on the main chain
    fn get_unspent_output(&self, input: &TransactionInput) -> Option<TransactionOutput>;

    /// Whether `input` references an output that is not spendable on the main
    /// chain (already spent or never created)
    fn is_double_spend(&self, input: &TransactionInput) -> bool;

    /// Whether `transactions`, applied in order on top of the branch ending at
    /// `previous_hash`, only spend outputs that exist and are unspent there,
    /// each at most once
    fn check_utxo_across_branches(&self, transactions: &[Transaction], previous_hash: &Hash)
        -> bool;

    /// UTXO set after the block `previous_hash` (empty for a genesis parent on
    /// an empty chain), `None` for an unknown branch
    fn branch_utxo_set(&self, previous_hash: &Hash) -> Option<UtxoSet>;

    /// Commit a validated block
    fn accept_block(&self, block: &Block) -> Result<Acceptance>;
}

/// Where an accepted block landed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceptance {
    /// Block is the new main-chain tip
    MainChain { height: Height },
    /// Block extends a branch that is not (yet) the longest
    SideBranch { height: Height },
}

/// ApplyTransactions: spend every input, then add every output.
///
/// Returns false as soon as an input is missing from `utxo_set` or an output
/// would replace one that is still unspent; the set is left partially updated
/// in that case, so callers apply to a scratch copy.
pub fn apply_transactions(transactions: &[Transaction], utxo_set: &mut UtxoSet) -> bool {
    for tx in transactions {
        for input in &tx.inputs {
            if utxo_set.remove(&input.prevout).is_none() {
                return false;
            }
        }

        let tx_id = transaction_id(tx);
        for (i, output) in tx.outputs.iter().enumerate() {
            let outpoint = OutPoint { hash: tx_id, index: i as u32 };
            if utxo_set.contains_key(&outpoint) {
                debug!(tx = %hex::encode(tx_id), index = i, "Output already unspent");
                return false;
            }
            utxo_set.insert(outpoint, output.clone());
        }
    }
    true
}

struct StoredBlock {
    block: Block,
    height: Height,
    utxo_set: UtxoSet,
}

#[derive(Default)]
struct ChainState {
    blocks: HashMap<Hash, StoredBlock>,
    tip: Option<Hash>,
}

impl ChainState {
    fn branch_utxo_set(&self, previous_hash: &Hash) -> Option<UtxoSet> {
        if *previous_hash == GENESIS_PARENT && self.blocks.is_empty() {
            return Some(UtxoSet::new());
        }
        self.utxo_after(previous_hash).cloned()
    }

    fn utxo_after(&self, hash: &Hash) -> Option<&UtxoSet> {
        self.blocks.get(hash).map(|stored| &stored.utxo_set)
    }

    fn main_utxo_set(&self) -> Option<&UtxoSet> {
        self.tip.as_ref().and_then(|tip| self.utxo_after(tip))
    }

    fn tip_height(&self) -> Height {
        self.tip
            .as_ref()
            .and_then(|tip| self.blocks.get(tip))
            .map_or(0, |stored| stored.height)
    }
}

/// In-memory block tree keeping a UTXO snapshot per block. The longest branch
/// is the main chain; on equal length the first-seen tip stays.
#[derive(Default)]
pub struct MemoryChain {
    state: RwLock<ChainState>,
}

impl MemoryChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.state.read().blocks.contains_key(hash)
    }

    pub fn block(&self, hash: &Hash) -> Option<Block> {
        self.state.read().blocks.get(hash).map(|stored| stored.block.clone())
    }

    /// Height of a stored block (genesis is 1)
    pub fn height_of(&self, hash: &Hash) -> Option<Height> {
        self.state.read().blocks.get(hash).map(|stored| stored.height)
    }

    /// Copy of the main-chain UTXO set
    pub fn utxo_set(&self) -> UtxoSet {
        self.state.read().main_utxo_set().cloned().unwrap_or_default()
    }

    /// Main chain from genesis to tip
    pub fn main_chain(&self) -> Vec<Hash> {
        let state = self.state.read();
        let mut hashes = Vec::new();
        let mut cursor = state.tip;
        while let Some(hash) = cursor {
            hashes.push(hash);
            cursor = state
                .blocks
                .get(&hash)
                .map(|stored| stored.block.header.prev_block_hash)
                .filter(|parent| state.blocks.contains_key(parent));
        }
        hashes.reverse();
        hashes
    }
}

impl ChainView for MemoryChain {
    fn current_height(&self) -> Height {
        self.state.read().tip_height()
    }

    fn tip_hash(&self) -> Hash {
        self.state.read().tip.unwrap_or(GENESIS_PARENT)
    }

    fn get_unspent_output(&self, input: &TransactionInput) -> Option<TransactionOutput> {
        self.state
            .read()
            .main_utxo_set()
            .and_then(|utxo_set| utxo_set.get(&input.prevout).cloned())
    }

    fn is_double_spend(&self, input: &TransactionInput) -> bool {
        !self
            .state
            .read()
            .main_utxo_set()
            .is_some_and(|utxo_set| utxo_set.contains_key(&input.prevout))
    }

    fn check_utxo_across_branches(
        &self,
        transactions: &[Transaction],
        previous_hash: &Hash,
    ) -> bool {
        match self.branch_utxo_set(previous_hash) {
            Some(mut scratch) => apply_transactions(transactions, &mut scratch),
            None => {
                debug!(previous = %hex::encode(previous_hash), "Unknown branch");
                false
            }
        }
    }

    fn branch_utxo_set(&self, previous_hash: &Hash) -> Option<UtxoSet> {
        self.state.read().branch_utxo_set(previous_hash)
    }

    fn accept_block(&self, block: &Block) -> Result<Acceptance> {
        let hash = block.hash();
        let parent = block.header.prev_block_hash;
        let mut state = self.state.write();

        if state.blocks.contains_key(&hash) {
            return Err(ConsensusError::Chain(format!(
                "block {} already stored",
                hex::encode(hash)
            )));
        }

        let (mut utxo_set, height) = if parent == GENESIS_PARENT && state.blocks.is_empty() {
            (UtxoSet::new(), 1)
        } else {
            match state.blocks.get(&parent) {
                Some(stored) => (stored.utxo_set.clone(), stored.height + 1),
                None => {
                    return Err(ConsensusError::Chain(format!(
                        "unknown parent {}",
                        hex::encode(parent)
                    )))
                }
            }
        };

        if !apply_transactions(&block.transactions, &mut utxo_set) {
            return Err(ConsensusError::Chain(format!(
                "block {} spends unavailable outputs or repeats an unspent one",
                hex::encode(hash)
            )));
        }

        state.blocks.insert(hash, StoredBlock { block: block.clone(), height, utxo_set });

        if height > state.tip_height() {
            state.tip = Some(hash);
            info!(height, hash = %hex::encode(hash), "New main-chain tip");
            Ok(Acceptance::MainChain { height })
        } else {
            debug!(height, hash = %hex::encode(hash), "Block stored on side branch");
            Ok(Acceptance::SideBranch { height })
        }
    }
}
