//! The initial chain every validator starts from.
//!
//! Block 1 locks part of each validator's coin allowance as stake. The
//! remaining coin is spent in fee-less transfers between validators, spread
//! over as many blocks as needed.

use {
    crate::config::GenesisConfig,
    log::*,
    rand::{seq::IndexedRandom, Rng},
    rand_chacha::ChaCha8Rng,
    std::sync::Arc,
    tendersim_consensus_bft::{error::Result, Block, Ledger, NodeId, Transaction},
};

/// Timestamp of the stake-locking block.
const LOCK_TIMESTAMP: u64 = 1;

pub struct GenesisInitiator<'a> {
    config: &'a GenesisConfig,
    max_block_size: usize,
}

impl<'a> GenesisInitiator<'a> {
    pub fn new(config: &'a GenesisConfig, max_block_size: usize) -> Self {
        Self {
            config,
            max_block_size: max_block_size.max(1),
        }
    }

    /// Build the shared initial chain for `validators`.
    pub fn build(&self, validators: &[NodeId], rng: &mut ChaCha8Rng) -> Result<Ledger> {
        let mut ledger = Ledger::new();
        if validators.is_empty() {
            return Ok(ledger);
        }

        let mut remaining = Vec::with_capacity(validators.len());
        let mut locks = Vec::with_capacity(validators.len());
        for id in validators {
            let coin = rng.random_range(self.config.min_coin..self.config.max_coin);
            let stake = rng.random_range(1..=coin / 2 + 1);
            locks.push(Transaction::lock_stake(
                LOCK_TIMESTAMP,
                id.address(),
                stake,
                self.config.min_lock_time,
            ));
            remaining.push(coin - stake);
        }
        append(&mut ledger, LOCK_TIMESTAMP, locks)?;

        // One transfer per funded validator per pass, so no block holds two
        // transfers from the same sender.
        while remaining.iter().any(|coin| *coin > 0) {
            let mut pass = Vec::new();
            for (index, id) in validators.iter().enumerate() {
                if remaining[index] == 0 {
                    continue;
                }
                let amount = rng.random_range(1..=remaining[index]);
                remaining[index] -= amount;
                let receiver = pick_receiver(validators, *id, rng);
                pass.push((id.address(), receiver.address(), amount));
            }
            for chunk in pass.chunks(self.max_block_size) {
                let timestamp = ledger.current_height() + 1;
                let transfers = chunk
                    .iter()
                    .map(|(sender, receiver, amount)| {
                        Transaction::money_transfer(timestamp, sender, receiver, *amount, 0)
                    })
                    .collect();
                append(&mut ledger, timestamp, transfers)?;
            }
        }

        info!(
            "genesis chain built: {} blocks for {} validators",
            ledger.current_height(),
            validators.len()
        );
        Ok(ledger)
    }
}

fn pick_receiver(validators: &[NodeId], sender: NodeId, rng: &mut ChaCha8Rng) -> NodeId {
    let others: Vec<NodeId> = validators
        .iter()
        .copied()
        .filter(|id| *id != sender)
        .collect();
    others.choose(rng).copied().unwrap_or(sender)
}

fn append(ledger: &mut Ledger, timestamp: u64, transactions: Vec<Transaction>) -> Result<()> {
    let height = ledger.current_height() + 1;
    let previous = ledger.tip().sha256_base64_hash().to_string();
    ledger.add_block(Arc::new(Block::new(height, timestamp, previous, transactions)))?;
    Ok(())
}
