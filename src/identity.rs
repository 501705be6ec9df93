//! Node identity: the key pair the coinbase pays and that can spend its outputs

use crate::error::Result;
use crate::script::{locking_script_for, spend_digest};
use crate::types::*;
use secp256k1::{All, Message, PublicKey, Secp256k1, SecretKey};
use sha2::{Digest, Sha256};
use std::fmt;

/// Payee of coinbase transactions built by this node
pub trait Identity: Send + Sync {
    /// Locking script paying this identity
    fn payee(&self) -> ByteString;
}

pub struct NodeIdentity {
    secp: Secp256k1<All>,
    secret_key: SecretKey,
    public_key: PublicKey,
}

impl NodeIdentity {
    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let secp = Secp256k1::new();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        Self { secp, secret_key, public_key }
    }

    /// Deterministic identity: the secret key is SHA256(seed)
    pub fn from_seed(seed: &[u8]) -> Result<Self> {
        let digest = Sha256::digest(seed);
        let secret_key = SecretKey::from_slice(&digest)?;
        Ok(Self::from_secret_key(secret_key))
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn locking_script(&self) -> ByteString {
        locking_script_for(&self.public_key)
    }

    /// Unlocking proof for `output` at `prevout`: compressed public key followed
    /// by the compact signature over the spend digest.
    pub fn unlocking_script(
        &self,
        prevout: &OutPoint,
        output: &TransactionOutput,
    ) -> Result<ByteString> {
        let message = Message::from_digest_slice(&spend_digest(prevout, output))?;
        let signature = self.secp.sign_ecdsa(&message, &self.secret_key);

        let mut script = self.public_key.serialize().to_vec();
        script.extend_from_slice(&signature.serialize_compact());
        Ok(script)
    }

    /// Input spending an output owned by this identity
    pub fn spend(&self, prevout: OutPoint, output: &TransactionOutput) -> Result<TransactionInput> {
        Ok(TransactionInput {
            prevout,
            unlocking_script: self.unlocking_script(&prevout, output)?,
            amount: output.amount,
        })
    }
}

impl Identity for NodeIdentity {
    fn payee(&self) -> ByteString {
        self.locking_script()
    }
}

impl fmt::Debug for NodeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeIdentity")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{LOCKING_SCRIPT_SIZE, UNLOCKING_SCRIPT_SIZE};

    #[test]
    fn test_seed_is_deterministic() {
        let a = NodeIdentity::from_seed(b"miner-1").unwrap();
        let b = NodeIdentity::from_seed(b"miner-1").unwrap();
        let c = NodeIdentity::from_seed(b"miner-2").unwrap();
        assert_eq!(a.public_key(), b.public_key());
        assert_ne!(a.public_key(), c.public_key());
    }

    #[test]
    fn test_payee_is_locking_script() {
        let identity = NodeIdentity::from_seed(b"miner-1").unwrap();
        assert_eq!(identity.payee(), identity.locking_script());
        assert_eq!(identity.payee().len(), LOCKING_SCRIPT_SIZE);
    }

    #[test]
    fn test_spend_carries_amount_and_proof() {
        let identity = NodeIdentity::from_seed(b"miner-1").unwrap();
        let output = TransactionOutput { amount: 12, locking_script: identity.payee() };
        let prevout = OutPoint { hash: [9; 32], index: 0 };
        let input = identity.spend(prevout, &output).unwrap();

        assert_eq!(input.amount, 12);
        assert_eq!(input.prevout, prevout);
        assert_eq!(input.unlocking_script.len(), UNLOCKING_SCRIPT_SIZE);
    }

    #[test]
    fn test_debug_hides_secret() {
        let identity = NodeIdentity::from_seed(b"miner-1").unwrap();
        let rendered = format!("{:?}", identity);
        assert!(rendered.contains("public_key"));
        assert!(!rendered.contains("secret"));
    }
}
