//! Canonical byte encoding used for hashing and size measurement
//!
//! This is not a wire format: it only has to be deterministic so that every
//! node derives the same transaction ids, merkle roots and block hashes.

use crate::error::{ConsensusError, Result};
use crate::types::*;
use bitcoin_hashes::{sha256d, Hash as BitcoinHash, HashEngine};

/// Encode a number as a Bitcoin varint
pub fn encode_varint(value: u64) -> Vec<u8> {
    if value < 0xfd {
        vec![value as u8]
    } else if value <= 0xffff {
        let mut result = vec![0xfd];
        result.extend_from_slice(&(value as u16).to_le_bytes());
        result
    } else if value <= 0xffffffff {
        let mut result = vec![0xfe];
        result.extend_from_slice(&(value as u32).to_le_bytes());
        result
    } else {
        let mut result = vec![0xff];
        result.extend_from_slice(&value.to_le_bytes());
        result
    }
}

fn push_bytes(data: &mut Vec<u8>, bytes: &[u8]) {
    data.extend_from_slice(&encode_varint(bytes.len() as u64));
    data.extend_from_slice(bytes);
}

/// Serialize a transaction
pub fn serialize_transaction(tx: &Transaction) -> Vec<u8> {
    let mut data = Vec::new();

    data.extend_from_slice(&tx.version.to_le_bytes());

    data.extend_from_slice(&encode_varint(tx.inputs.len() as u64));
    for input in &tx.inputs {
        data.extend_from_slice(&input.prevout.hash);
        data.extend_from_slice(&input.prevout.index.to_le_bytes());
        push_bytes(&mut data, &input.unlocking_script);
        data.extend_from_slice(&input.amount.to_le_bytes());
    }

    data.extend_from_slice(&encode_varint(tx.outputs.len() as u64));
    for output in &tx.outputs {
        data.extend_from_slice(&output.amount.to_le_bytes());
        push_bytes(&mut data, &output.locking_script);
    }

    data.extend_from_slice(&tx.lock_time.to_le_bytes());
    data
}

/// Serialize a block header (fixed 112 bytes)
pub fn serialize_header(header: &BlockHeader) -> Vec<u8> {
    let mut data = Vec::with_capacity(HEADER_SIZE);
    data.extend_from_slice(&header.version.to_le_bytes());
    data.extend_from_slice(&header.prev_block_hash);
    data.extend_from_slice(&header.merkle_root);
    data.extend_from_slice(&header.timestamp.to_le_bytes());
    data.extend_from_slice(&header.difficulty_target);
    data.extend_from_slice(&header.nonce.to_le_bytes());
    data
}

/// Encoded header length
pub const HEADER_SIZE: usize = 4 + 32 + 32 + 8 + 32 + 4;

/// Double SHA-256
pub fn sha256d(data: &[u8]) -> Hash {
    let mut engine = sha256d::Hash::engine();
    engine.input(data);
    let result = sha256d::Hash::from_engine(engine);
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

pub fn transaction_id(tx: &Transaction) -> Hash {
    sha256d(&serialize_transaction(tx))
}

/// Block hash: double SHA-256 of the encoded header
pub fn block_hash(header: &BlockHeader) -> Hash {
    sha256d(&serialize_header(header))
}

/// Merkle root over transaction ids. An odd hash at any level is paired with
/// itself.
pub fn merkle_root(transactions: &[Transaction]) -> Result<Hash> {
    if transactions.is_empty() {
        return Err(ConsensusError::MalformedPool(
            "Cannot calculate merkle root for empty transaction list".to_string(),
        ));
    }

    let mut hashes: Vec<Hash> = transactions.iter().map(transaction_id).collect();

    while hashes.len() > 1 {
        hashes = hashes
            .chunks(2)
            .map(|pair| {
                let right = pair.get(1).unwrap_or(&pair[0]);
                let mut combined = Vec::with_capacity(64);
                combined.extend_from_slice(&pair[0]);
                combined.extend_from_slice(right);
                sha256d(&combined)
            })
            .collect();
    }

    Ok(hashes[0])
}

impl Transaction {
    /// Encoded size in bytes
    pub fn size(&self) -> usize {
        serialize_transaction(self).len()
    }

    pub fn id(&self) -> Hash {
        transaction_id(self)
    }
}

impl Block {
    /// Encoded size in bytes: header, transaction count, transactions
    pub fn size(&self) -> usize {
        HEADER_SIZE
            + encode_varint(self.transactions.len() as u64).len()
            + self.transactions.iter().map(Transaction::size).sum::<usize>()
    }

    pub fn hash(&self) -> Hash {
        block_hash(&self.header)
    }
}
