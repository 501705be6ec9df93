//! Core ledger types shared by the miner and the validators

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Hash type: 256-bit hash
pub type Hash = [u8; 32];

/// Byte string type
pub type ByteString = Vec<u8>;

/// Value carried by an output, in base units
pub type Amount = u64;

/// Block height / chain length
pub type Height = u64;

/// Reference to an output of a prior transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    pub hash: Hash,
    pub index: u32,
}

/// Transaction input: a spent output reference, the proof unlocking it, and
/// the amount the spender claims the referenced output carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionInput {
    pub prevout: OutPoint,
    pub unlocking_script: ByteString,
    pub amount: Amount,
}

/// Transaction output: amount plus the condition that must be met to spend it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionOutput {
    pub amount: Amount,
    pub locking_script: ByteString,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<TransactionInput>,
    pub outputs: Vec<TransactionOutput>,
    pub lock_time: u32,
}

impl Transaction {
    /// Coinbase shape: no inputs, at least one output
    pub fn is_coinbase(&self) -> bool {
        self.inputs.is_empty() && !self.outputs.is_empty()
    }

    /// Sum of declared input amounts, `None` on overflow
    pub fn sum_inputs(&self) -> Option<Amount> {
        self.inputs
            .iter()
            .try_fold(0 as Amount, |acc, input| acc.checked_add(input.amount))
    }

    /// Sum of output amounts, `None` on overflow
    pub fn sum_outputs(&self) -> Option<Amount> {
        self.outputs
            .iter()
            .try_fold(0 as Amount, |acc, output| acc.checked_add(output.amount))
    }
}

/// Block header. `difficulty_target` is the 256-bit big-endian threshold the
/// header hash must stay below.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub version: u32,
    pub prev_block_hash: Hash,
    pub merkle_root: Hash,
    pub timestamp: u64,
    pub difficulty_target: Hash,
    pub nonce: u32,
}

/// Block: header plus transactions, coinbase first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn coinbase(&self) -> Option<&Transaction> {
        self.transactions.first()
    }
}

/// UTXO Set: outpoint → unspent output
pub type UtxoSet = HashMap<OutPoint, TransactionOutput>;

/// Validation result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Valid,
    Invalid(String),
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }
}
