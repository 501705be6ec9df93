//! Pending-transaction pool seen by the miner

use crate::economic::calculate_fee;
use crate::types::*;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// What the mining controller needs from the pool
pub trait PendingPool: Send + Sync {
    /// Whether the pool holds enough to be worth mining
    fn meets_priority_threshold(&self) -> bool;

    /// Transactions for the next candidate block, in block order
    fn select_for_mining(&self) -> Vec<Transaction>;
}

/// Receives a notification every time the pool's contents change
pub trait PoolListener: Send + Sync {
    fn pool_changed(&self);
}

/// Outcome of offering a transaction to the pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Accepted,
    Rejected(String),
}

struct PoolEntry {
    tx: Transaction,
    fee: Amount,
    sequence: u64,
}

#[derive(Default)]
struct PoolState {
    entries: HashMap<Hash, PoolEntry>,
    /// Outpoint -> id of the pending transaction spending it
    spends: HashMap<OutPoint, Hash>,
    next_sequence: u64,
}

impl PoolState {
    fn remove(&mut self, tx_id: &Hash) -> bool {
        match self.entries.remove(tx_id) {
            Some(entry) => {
                for input in &entry.tx.inputs {
                    self.spends.remove(&input.prevout);
                }
                true
            }
            None => false,
        }
    }
}

/// In-memory pool.
///
/// Admission only checks shape and fee; unlocking proofs and UTXO existence
/// are the block validator's job. Selection is highest fee first, ties broken
/// by arrival order.
pub struct MemoryPool {
    min_transactions: usize,
    max_selected: usize,
    state: Mutex<PoolState>,
    listener: RwLock<Option<Arc<dyn PoolListener>>>,
}

impl MemoryPool {
    pub fn new(min_transactions: usize, max_selected: usize) -> Self {
        Self {
            min_transactions,
            max_selected,
            state: Mutex::new(PoolState::default()),
            listener: RwLock::new(None),
        }
    }

    pub fn set_listener(&self, listener: Arc<dyn PoolListener>) {
        *self.listener.write() = Some(listener);
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, tx_id: &Hash) -> bool {
        self.state.lock().entries.contains_key(tx_id)
    }

    /// AddTransaction: rejects coinbases, non-positive fees, duplicates and
    /// transactions spending an outpoint another pending transaction spends.
    pub fn add(&self, tx: Transaction) -> Admission {
        let fee = match calculate_fee(&tx) {
            Ok(fee) => fee,
            Err(e) => return Admission::Rejected(e.to_string()),
        };
        let tx_id = tx.id();

        {
            let mut state = self.state.lock();
            if state.entries.contains_key(&tx_id) {
                return Admission::Rejected("transaction already pending".to_string());
            }
            if let Some(input) = tx.inputs.iter().find(|i| state.spends.contains_key(&i.prevout)) {
                return Admission::Rejected(format!(
                    "outpoint {}:{} already spent by a pending transaction",
                    hex::encode(input.prevout.hash),
                    input.prevout.index
                ));
            }

            for input in &tx.inputs {
                state.spends.insert(input.prevout, tx_id);
            }
            let sequence = state.next_sequence;
            state.next_sequence += 1;
            state.entries.insert(tx_id, PoolEntry { tx, fee, sequence });
        }

        trace!(tx = %hex::encode(tx_id), fee, "Transaction added to pool");
        self.notify();
        Admission::Accepted
    }

    /// Remove a pending transaction by id
    pub fn remove(&self, tx_id: &Hash) -> bool {
        let removed = self.state.lock().remove(tx_id);
        if removed {
            self.notify();
        }
        removed
    }

    /// Drop everything `block` confirmed, plus pending transactions that
    /// spend an outpoint the block consumed. Returns how many were dropped.
    pub fn remove_confirmed(&self, block: &Block) -> usize {
        let removed = {
            let mut state = self.state.lock();
            let mut doomed: Vec<Hash> = Vec::new();
            for tx in &block.transactions {
                let tx_id = tx.id();
                if state.entries.contains_key(&tx_id) {
                    doomed.push(tx_id);
                }
                for input in &tx.inputs {
                    if let Some(conflict) = state.spends.get(&input.prevout) {
                        doomed.push(*conflict);
                    }
                }
            }
            doomed.into_iter().filter(|tx_id| state.remove(tx_id)).count()
        };

        if removed > 0 {
            debug!(removed, "Pruned pool after block");
            self.notify();
        }
        removed
    }

    fn notify(&self) {
        // clone out of the lock so the listener may call back into the pool
        let listener = self.listener.read().clone();
        if let Some(listener) = listener {
            listener.pool_changed();
        }
    }
}

impl PendingPool for MemoryPool {
    fn meets_priority_threshold(&self) -> bool {
        let len = self.len();
        len > 0 && len >= self.min_transactions
    }

    fn select_for_mining(&self) -> Vec<Transaction> {
        let state = self.state.lock();
        let mut entries: Vec<&PoolEntry> = state.entries.values().collect();
        entries.sort_by(|a, b| b.fee.cmp(&a.fee).then(a.sequence.cmp(&b.sequence)));
        entries.into_iter().take(self.max_selected).map(|e| e.tx.clone()).collect()
    }
}
