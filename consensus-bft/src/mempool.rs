//! Transaction pool feeding block proposals.
//!
//! Pending transactions wait in FIFO order. A proposer takes a batch out
//! with [`TransactionPool::select_batch`]; those transactions are held as
//! "polled" until the next commit, when [`TransactionPool::reconcile`]
//! returns every polled transaction that did not make it into the committed
//! block.

use {
    crate::transaction::Transaction,
    log::*,
    std::collections::{HashSet, VecDeque},
};

#[derive(Debug, Default, Clone)]
pub struct TransactionPool {
    queue: VecDeque<Transaction>,
    /// Mirror of `queue` for membership checks.
    pending: HashSet<Transaction>,
    polled: HashSet<Transaction>,
}

impl TransactionPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `tx` unless an equal transaction is already pending or polled.
    /// Returns whether it was inserted.
    pub fn submit(&mut self, tx: Transaction) -> bool {
        if self.pending.contains(&tx) || self.polled.contains(&tx) {
            return false;
        }
        self.pending.insert(tx.clone());
        self.queue.push_back(tx);
        true
    }

    /// Take up to `max_size` valid transactions from the front of the pool.
    ///
    /// Transactions failing [`Transaction::is_basic_valid`] are dropped.
    pub fn select_batch(&mut self, max_size: usize) -> Vec<Transaction> {
        let mut batch = Vec::with_capacity(max_size.min(self.queue.len()));
        while batch.len() < max_size {
            let Some(tx) = self.queue.pop_front() else {
                break;
            };
            self.pending.remove(&tx);
            if !tx.is_basic_valid() {
                debug!("dropping invalid transaction {tx}");
                continue;
            }
            self.polled.insert(tx.clone());
            batch.push(tx);
        }
        batch
    }

    /// Settle the pool after a commit.
    ///
    /// Committed transactions leave the pool for good. Polled transactions
    /// that were not committed go back to the end of the queue.
    pub fn reconcile(&mut self, committed: &[Transaction]) {
        let committed: HashSet<&Transaction> = committed.iter().collect();
        let mut returned: Vec<Transaction> = self
            .polled
            .drain()
            .filter(|tx| !committed.contains(tx))
            .collect();
        // Keep re-enqueue order independent of hash-set iteration order.
        returned.sort_by_key(|tx| (tx.timestamp(), tx.sha256_base64_hash()));

        if !returned.is_empty() {
            debug!("returning {} polled transactions to the pool", returned.len());
        }
        for tx in returned {
            if self.pending.insert(tx.clone()) {
                self.queue.push_back(tx);
            }
        }

        if self.queue.iter().any(|tx| committed.contains(tx)) {
            self.queue.retain(|tx| !committed.contains(tx));
            self.pending.retain(|tx| !committed.contains(tx));
        }
    }

    pub fn contains(&self, tx: &Transaction) -> bool {
        self.pending.contains(tx) || self.polled.contains(tx)
    }

    /// Number of transactions waiting in the queue.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn polled_len(&self) -> usize {
        self.polled.len()
    }
}
