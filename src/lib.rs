//! # ledger-consensus
//!
//! Consensus core of a proof-of-work ledger node.
//!
//! The crate assembles and mines candidate blocks from a pool of pending
//! transactions, and validates blocks and transactions against the unspent
//! output set before they are accepted.
//!
//! ## Architecture
//!
//! - Pure rules: reward schedule (`economic`), coinbase assembly and nonce
//!   search (`mining`), block and transaction checks (`block`, `transaction`)
//! - Collaborator seams: `ChainView`, `PendingPool`, `UnlockVerifier`,
//!   `Identity`, `NetworkSend`, `BlockAcceptor`, with in-memory
//!   implementations used by tests and embedding nodes
//! - Mining controller (`miner`): a tokio event loop owning at most one
//!   cancellable nonce search at a time
//!
//! ## Usage
//!
//! ```rust
//! use ledger_consensus::economic::block_reward;
//!
//! assert_eq!(block_reward(0, 100, 10, 2), 100);
//! assert_eq!(block_reward(15, 100, 10, 2), 50);
//! assert_eq!(block_reward(30, 100, 10, 2), 0);
//! ```

pub mod types;
pub mod constants;
pub mod error;
pub mod config;
pub mod logging;
pub mod encoding;
pub mod pow;
pub mod economic;
pub mod script;
pub mod identity;
pub mod chain;
pub mod pool;
pub mod mining;
pub mod miner;
pub mod transaction;
pub mod block;
pub mod validation;
pub mod node;

// Re-export commonly used types
pub use types::*;
pub use constants::*;
pub use error::{ConsensusError, Result};
pub use config::ConsensusConfig;
pub use chain::{ChainView, MemoryChain};
pub use pool::{MemoryPool, PendingPool, PoolListener};
pub use miner::{BlockAcceptor, Collaborators, Miner, MinerHandle, MinerStatus, NetworkSend};
pub use node::LocalNode;
pub use pow::Target;
pub use validation::Validator;
