//! Protocol defaults used when no configuration overrides them

use crate::types::{Amount, Height};

/// Transaction version written into coinbase transactions
pub const DEFAULT_VERSION: u32 = 0;

/// Lock time written into coinbase transactions
pub const DEFAULT_LOCK_TIME: u32 = 0;

/// Subsidy paid by blocks before the first halving
pub const INITIAL_SUBSIDY: Amount = 100;

/// Blocks between two subsidy halvings
pub const HALVING_INTERVAL: Height = 10;

/// Number of halvings after which the subsidy is exhausted
pub const MAX_HALVINGS: u64 = 2;

/// Maximum encoded block (and transaction) size in bytes
pub const MAX_BLOCK_SIZE: usize = 1_000_000;

/// Nonces tried per mining attempt
pub const NONCE_LIMIT: u32 = 1 << 22;

/// Initial proof-of-work target: 16 leading zero bits
pub const INITIAL_DIFFICULTY_TARGET: &str =
    "0000ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff";

/// Right shifts of a u64 by this much or more always yield zero
pub const SUBSIDY_SHIFT_LIMIT: u64 = 64;

/// Locking scripts are RIPEMD160(SHA256(pubkey))
pub const LOCKING_SCRIPT_SIZE: usize = 20;

/// Compressed secp256k1 public key
pub const PUBLIC_KEY_SIZE: usize = 33;

/// Compact ECDSA signature
pub const SIGNATURE_SIZE: usize = 64;

/// Unlocking proof: public key followed by signature
pub const UNLOCKING_SCRIPT_SIZE: usize = PUBLIC_KEY_SIZE + SIGNATURE_SIZE;
