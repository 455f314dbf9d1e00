//! Proof-of-stake weight table.
//!
//! Maps committee addresses to stake weights. The table is only ever
//! mutated by `LockStake` / `UnlockStake` transactions found in committed
//! blocks, so every validator replaying the same chain holds the same table.

use {
    crate::{ledger::Ledger, transaction::Transaction, types::Block},
    std::collections::BTreeMap,
};

/// A single staked address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StakeNode {
    pub address: String,
    pub weight: u64,
}

/// Address → weight table with a cached total.
///
/// Iteration is in address order, which is the interval layout order used
/// by the committee sampler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProofOfStakeState {
    weights: BTreeMap<String, u64>,
    total_weight: u64,
}

impl ProofOfStakeState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the table by replaying every block of `ledger`.
    pub fn from_ledger(ledger: &Ledger) -> Self {
        let mut state = Self::new();
        for block in ledger.iter() {
            state.apply_block(block);
        }
        state
    }

    /// Apply the stake transactions of a committed block.
    pub fn apply_block(&mut self, block: &Block) {
        for tx in block.transactions() {
            match tx {
                Transaction::LockStake(lock) => self.add_weight(&lock.sender, lock.amount),
                Transaction::UnlockStake(unlock) => {
                    self.remove_weight(&unlock.sender, unlock.amount)
                }
                Transaction::MoneyTransfer(_) => {}
            }
        }
    }

    /// Set an address's weight, replacing any previous value. A zero weight
    /// removes the address.
    pub fn initiate_address_weight(&mut self, address: &str, weight: u64) {
        if let Some(previous) = self.weights.remove(address) {
            self.total_weight = self.total_weight.saturating_sub(previous);
        }
        if weight > 0 {
            self.weights.insert(address.to_string(), weight);
            self.total_weight = self.total_weight.saturating_add(weight);
        }
    }

    /// Add `amount` to an address, creating it if needed. Zero is ignored.
    pub fn add_weight(&mut self, address: &str, amount: u64) {
        if amount == 0 {
            return;
        }
        let weight = self.weights.entry(address.to_string()).or_insert(0);
        *weight = weight.saturating_add(amount);
        self.total_weight = self.total_weight.saturating_add(amount);
    }

    /// Remove `amount` from a known address. The address is dropped once its
    /// weight reaches zero. Zero amounts and unknown addresses are ignored.
    pub fn remove_weight(&mut self, address: &str, amount: u64) {
        if amount == 0 {
            return;
        }
        let Some(weight) = self.weights.get_mut(address) else {
            return;
        };
        if *weight > amount {
            *weight -= amount;
            self.total_weight = self.total_weight.saturating_sub(amount);
        } else {
            self.total_weight = self.total_weight.saturating_sub(*weight);
            self.weights.remove(address);
        }
    }

    pub fn clear(&mut self) {
        self.weights.clear();
        self.total_weight = 0;
    }

    pub fn node(&self, address: &str) -> Option<StakeNode> {
        self.weights.get(address).map(|weight| StakeNode {
            address: address.to_string(),
            weight: *weight,
        })
    }

    pub fn weight_of(&self, address: &str) -> u64 {
        self.weights.get(address).copied().unwrap_or(0)
    }

    /// All staked addresses in address order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.weights
            .iter()
            .map(|(address, weight)| (address.as_str(), *weight))
    }

    pub fn nodes(&self) -> Vec<StakeNode> {
        self.iter()
            .map(|(address, weight)| StakeNode {
                address: address.to_string(),
                weight,
            })
            .collect()
    }

    pub fn total_weight(&self) -> u64 {
        self.total_weight
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}
