//! Transactions carried by blocks.
//!
//! Transactions compare and hash by content. Two validators that received
//! the same transfer from different peers hold equal values, which is what
//! pool deduplication and cross-validator agreement checks rely on.

use {crate::hash::two_level_hash, std::fmt};

/// Smallest lock duration a `LockStake` transaction may request.
pub const MINIMAL_MIN_LOCK_TIME: u64 = 15;

/// Transfer of coins between two addresses.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MoneyTransfer {
    pub timestamp: u64,
    pub sender: String,
    pub receiver: String,
    pub amount: u64,
    pub fees: u64,
}

/// Adds `amount` to the sender's stake weight once committed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockStake {
    pub timestamp: u64,
    pub sender: String,
    pub amount: u64,
    pub min_lock_time: u64,
}

/// Removes `amount` from the sender's stake weight once committed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnlockStake {
    pub timestamp: u64,
    pub sender: String,
    pub amount: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Transaction {
    MoneyTransfer(MoneyTransfer),
    LockStake(LockStake),
    UnlockStake(UnlockStake),
}

impl Transaction {
    pub fn money_transfer(
        timestamp: u64,
        sender: impl Into<String>,
        receiver: impl Into<String>,
        amount: u64,
        fees: u64,
    ) -> Self {
        Transaction::MoneyTransfer(MoneyTransfer {
            timestamp,
            sender: sender.into(),
            receiver: receiver.into(),
            amount,
            fees,
        })
    }

    pub fn lock_stake(
        timestamp: u64,
        sender: impl Into<String>,
        amount: u64,
        min_lock_time: u64,
    ) -> Self {
        Transaction::LockStake(LockStake {
            timestamp,
            sender: sender.into(),
            amount,
            min_lock_time,
        })
    }

    pub fn unlock_stake(timestamp: u64, sender: impl Into<String>, amount: u64) -> Self {
        Transaction::UnlockStake(UnlockStake {
            timestamp,
            sender: sender.into(),
            amount,
        })
    }

    pub fn timestamp(&self) -> u64 {
        match self {
            Transaction::MoneyTransfer(tx) => tx.timestamp,
            Transaction::LockStake(tx) => tx.timestamp,
            Transaction::UnlockStake(tx) => tx.timestamp,
        }
    }

    pub fn sender(&self) -> &str {
        match self {
            Transaction::MoneyTransfer(tx) => &tx.sender,
            Transaction::LockStake(tx) => &tx.sender,
            Transaction::UnlockStake(tx) => &tx.sender,
        }
    }

    pub fn amount(&self) -> u64 {
        match self {
            Transaction::MoneyTransfer(tx) => tx.amount,
            Transaction::LockStake(tx) => tx.amount,
            Transaction::UnlockStake(tx) => tx.amount,
        }
    }

    /// Stateless validity: positive timestamp, non-blank sender, positive
    /// amount, plus the variant-specific minimums.
    pub fn is_basic_valid(&self) -> bool {
        let common =
            self.timestamp() > 0 && !self.sender().trim().is_empty() && self.amount() > 0;
        common
            && match self {
                Transaction::MoneyTransfer(tx) => !tx.receiver.trim().is_empty() && tx.fees > 0,
                Transaction::LockStake(tx) => tx.min_lock_time >= MINIMAL_MIN_LOCK_TIME,
                Transaction::UnlockStake(_) => true,
            }
    }

    /// Content hash over the variant's fields. The timestamp is not part of it.
    ///
    /// Field orders:
    /// - money transfer: sender, receiver, amount, fees
    /// - lock stake: sender, amount, min lock time
    /// - unlock stake: sender, amount
    pub fn sha256_base64_hash(&self) -> String {
        match self {
            Transaction::MoneyTransfer(tx) => two_level_hash([
                tx.sender.as_bytes(),
                tx.receiver.as_bytes(),
                &tx.amount.to_be_bytes()[..],
                &tx.fees.to_be_bytes()[..],
            ]),
            Transaction::LockStake(tx) => two_level_hash([
                tx.sender.as_bytes(),
                &tx.amount.to_be_bytes()[..],
                &tx.min_lock_time.to_be_bytes()[..],
            ]),
            Transaction::UnlockStake(tx) => {
                two_level_hash([tx.sender.as_bytes(), &tx.amount.to_be_bytes()[..]])
            }
        }
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transaction::MoneyTransfer(tx) => write!(
                f,
                "MoneyTransfer[{} -> {}: {} (fees {}) @{}]",
                tx.sender, tx.receiver, tx.amount, tx.fees, tx.timestamp
            ),
            Transaction::LockStake(tx) => write!(
                f,
                "LockStake[{}: {} for {} @{}]",
                tx.sender, tx.amount, tx.min_lock_time, tx.timestamp
            ),
            Transaction::UnlockStake(tx) => write!(
                f,
                "UnlockStake[{}: {} @{}]",
                tx.sender, tx.amount, tx.timestamp
            ),
        }
    }
}
