//! Local block handling: validate, commit, prune the pool

use crate::chain::{Acceptance, ChainView};
use crate::miner::BlockAcceptor;
use crate::pool::{Admission, MemoryPool};
use crate::types::*;
use crate::validation::Validator;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Acceptance path for blocks mined locally or received from peers
pub struct LocalNode {
    validator: Validator,
    pool: Arc<MemoryPool>,
}

impl LocalNode {
    pub fn new(validator: Validator, pool: Arc<MemoryPool>) -> Self {
        Self { validator, pool }
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    /// Validate a transaction against the main chain before it enters the pool
    pub fn submit_transaction(&self, tx: Transaction) -> bool {
        if !self.validator.check_transaction(&tx) {
            return false;
        }
        match self.pool.add(tx) {
            Admission::Accepted => true,
            Admission::Rejected(reason) => {
                debug!(%reason, "Transaction refused by pool");
                false
            }
        }
    }
}

impl BlockAcceptor for LocalNode {
    fn handle_block(&self, block: Block) -> bool {
        if !self.validator.check_block(&block) {
            return false;
        }

        let hash = block.hash();
        match self.validator.chain().accept_block(&block) {
            Ok(Acceptance::MainChain { height }) => {
                info!(height, hash = %hex::encode(hash), "Block accepted");
                self.pool.remove_confirmed(&block);
                true
            }
            Ok(Acceptance::SideBranch { height }) => {
                debug!(height, hash = %hex::encode(hash), "Block accepted on side branch");
                true
            }
            Err(e) => {
                warn!(error = %e, hash = %hex::encode(hash), "Chain refused block");
                false
            }
        }
    }
}
