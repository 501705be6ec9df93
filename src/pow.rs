//! Proof of work: difficulty targets and the header hash check

use crate::encoding::block_hash;
use crate::error::{ConsensusError, Result};
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 256-bit proof-of-work threshold, stored big-endian.
///
/// Byte-wise lexicographic order on a big-endian array is numeric order, so
/// `hash < target` is a plain array comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Target(Hash);

impl Target {
    pub fn from_bytes(bytes: Hash) -> Self {
        Target(bytes)
    }

    pub fn as_bytes(&self) -> &Hash {
        &self.0
    }

    /// Easiest possible target: every hash except all-ones satisfies it
    pub fn max() -> Self {
        Target([0xff; 32])
    }

    /// Parse 64 hex characters
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim())
            .map_err(|e| ConsensusError::InvalidTarget(format!("{}: {}", s, e)))?;
        let bytes: Hash = bytes.try_into().map_err(|b: Vec<u8>| {
            ConsensusError::InvalidTarget(format!("expected 32 bytes, got {}", b.len()))
        })?;
        Ok(Target(bytes))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Target requiring `zeros` leading zero bits in the hash.
    ///
    /// The result is `2^(256 - zeros) - 1`; `zeros >= 256` gives the
    /// unsatisfiable zero target.
    pub fn from_leading_zero_bits(zeros: u32) -> Self {
        let mut bytes = [0xffu8; 32];
        let full = (zeros / 8) as usize;
        if full >= 32 {
            return Target([0; 32]);
        }
        for byte in bytes.iter_mut().take(full) {
            *byte = 0;
        }
        bytes[full] = 0xff >> (zeros % 8);
        Target(bytes)
    }

    /// Expand a compact `0xEEMMMMMM` target: mantissa * 256^(exponent - 3)
    pub fn from_compact(bits: u32) -> Result<Self> {
        let exponent = (bits >> 24) as usize;
        let mantissa = bits & 0x007f_ffff;

        if bits & 0x0080_0000 != 0 {
            return Err(ConsensusError::InvalidTarget(
                "Negative compact target".to_string(),
            ));
        }
        if exponent > 32 {
            return Err(ConsensusError::InvalidTarget("Target too large".to_string()));
        }

        let mantissa_bytes = mantissa.to_be_bytes(); // [0, m2, m1, m0]
        let mut bytes = [0u8; 32];
        if exponent <= 3 {
            let value = mantissa >> (8 * (3 - exponent));
            bytes[28..].copy_from_slice(&value.to_be_bytes());
        } else {
            // most significant mantissa byte lands at index 32 - exponent
            let start = 32 - exponent;
            bytes[start..start + 3].copy_from_slice(&mantissa_bytes[1..]);
        }
        Ok(Target(bytes))
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }

    /// Numeric `hash < target`
    pub fn is_met_by(&self, hash: &Hash) -> bool {
        hash < &self.0
    }

    /// Number of leading zero bits every satisfying hash must have
    pub fn leading_zero_bits(&self) -> u32 {
        let mut zeros = 0;
        for byte in &self.0 {
            if *byte == 0 {
                zeros += 8;
            } else {
                zeros += byte.leading_zeros();
                break;
            }
        }
        zeros
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<Target> for Hash {
    fn from(target: Target) -> Hash {
        target.0
    }
}

/// CheckProofOfWork against an explicit target
pub fn hash_meets_target(header: &BlockHeader, target: &Target) -> bool {
    target.is_met_by(&block_hash(header))
}

/// CheckProofOfWork against the header's own declared target
pub fn satisfies_pow(header: &BlockHeader) -> bool {
    hash_meets_target(header, &Target::from_bytes(header.difficulty_target))
}
