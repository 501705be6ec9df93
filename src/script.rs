//! Locking conditions and their unlocking proofs
//!
//! An output is locked to `RIPEMD160(SHA256(pubkey))`. Spending it takes the
//! compressed public key followed by a compact ECDSA signature over the spend
//! digest of the referenced output.

use crate::constants::*;
use crate::encoding::sha256d;
use crate::types::*;
use ripemd::Ripemd160;
use secp256k1::{ecdsa::Signature, Message, PublicKey, Secp256k1, VerifyOnly};
use sha2::{Digest, Sha256};

/// RIPEMD160(SHA256(x))
pub fn hash160(data: &[u8]) -> [u8; LOCKING_SCRIPT_SIZE] {
    let sha256_hash = Sha256::digest(data);
    let ripemd160_hash = Ripemd160::digest(&sha256_hash);
    let mut out = [0u8; LOCKING_SCRIPT_SIZE];
    out.copy_from_slice(&ripemd160_hash);
    out
}

/// Locking script paying the holder of `public_key`
pub fn locking_script_for(public_key: &PublicKey) -> ByteString {
    hash160(&public_key.serialize()).to_vec()
}

/// Digest signed by the spender: binds the proof to the exact output spent
pub fn spend_digest(prevout: &OutPoint, output: &TransactionOutput) -> Hash {
    let mut data = Vec::with_capacity(32 + 4 + 8 + output.locking_script.len());
    data.extend_from_slice(&prevout.hash);
    data.extend_from_slice(&prevout.index.to_le_bytes());
    data.extend_from_slice(&output.amount.to_le_bytes());
    data.extend_from_slice(&output.locking_script);
    sha256d(&data)
}

/// Decides whether an unlocking proof satisfies an output's locking condition
pub trait UnlockVerifier: Send + Sync {
    fn is_unlocked(
        &self,
        prevout: &OutPoint,
        output: &TransactionOutput,
        unlocking_script: &[u8],
    ) -> bool;
}

/// Pay-to-public-key-hash verification over secp256k1
pub struct Secp256k1Verifier {
    secp: Secp256k1<VerifyOnly>,
}

impl Secp256k1Verifier {
    pub fn new() -> Self {
        Self { secp: Secp256k1::verification_only() }
    }
}

impl Default for Secp256k1Verifier {
    fn default() -> Self {
        Self::new()
    }
}

impl UnlockVerifier for Secp256k1Verifier {
    fn is_unlocked(
        &self,
        prevout: &OutPoint,
        output: &TransactionOutput,
        unlocking_script: &[u8],
    ) -> bool {
        if unlocking_script.len() != UNLOCKING_SCRIPT_SIZE {
            return false;
        }
        let (pubkey_bytes, signature_bytes) = unlocking_script.split_at(PUBLIC_KEY_SIZE);

        if hash160(pubkey_bytes)[..] != output.locking_script[..] {
            return false;
        }

        verify_signature(
            &self.secp,
            pubkey_bytes,
            signature_bytes,
            &spend_digest(prevout, output),
        )
    }
}

/// Verify a compact ECDSA signature using secp256k1
fn verify_signature(
    secp: &Secp256k1<VerifyOnly>,
    pubkey_bytes: &[u8],
    signature_bytes: &[u8],
    digest: &Hash,
) -> bool {
    let pubkey = match PublicKey::from_slice(pubkey_bytes) {
        Ok(pk) => pk,
        Err(_) => return false,
    };

    let signature = match Signature::from_compact(signature_bytes) {
        Ok(sig) => sig,
        Err(_) => return false,
    };

    let message = match Message::from_digest_slice(digest) {
        Ok(message) => message,
        Err(_) => return false,
    };

    secp.verify_ecdsa(&message, &signature, &pubkey).is_ok()
}
