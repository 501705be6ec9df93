//! Validation facade bound to a chain, a verifier and the configured limits

use crate::block;
use crate::chain::ChainView;
use crate::config::ConsensusConfig;
use crate::script::UnlockVerifier;
use crate::transaction;
use crate::types::*;
use std::sync::Arc;
use tracing::debug;

/// Runs the block and transaction rules against one chain
#[derive(Clone)]
pub struct Validator {
    config: ConsensusConfig,
    chain: Arc<dyn ChainView>,
    verifier: Arc<dyn UnlockVerifier>,
}

impl Validator {
    pub fn new(
        config: ConsensusConfig,
        chain: Arc<dyn ChainView>,
        verifier: Arc<dyn UnlockVerifier>,
    ) -> Self {
        Self { config, chain, verifier }
    }

    pub fn config(&self) -> &ConsensusConfig {
        &self.config
    }

    pub fn chain(&self) -> &Arc<dyn ChainView> {
        &self.chain
    }

    /// Block rules with the rejection reason
    pub fn validate_block(&self, block: &Block) -> ValidationResult {
        block::check_block(
            block,
            self.chain.as_ref(),
            self.verifier.as_ref(),
            self.config.max_block_size,
        )
    }

    /// Transaction rules with the rejection reason
    pub fn validate_transaction(&self, tx: &Transaction) -> ValidationResult {
        transaction::check_transaction(
            tx,
            self.chain.as_ref(),
            self.verifier.as_ref(),
            self.config.max_block_size,
        )
    }

    pub fn check_block(&self, block: &Block) -> bool {
        match self.validate_block(block) {
            ValidationResult::Valid => true,
            ValidationResult::Invalid(reason) => {
                debug!(hash = %hex::encode(block.hash()), %reason, "Block rejected");
                false
            }
        }
    }

    pub fn check_transaction(&self, tx: &Transaction) -> bool {
        match self.validate_transaction(tx) {
            ValidationResult::Valid => true,
            ValidationResult::Invalid(reason) => {
                debug!(tx = %hex::encode(tx.id()), %reason, "Transaction rejected");
                false
            }
        }
    }
}
