//! Client actor: submits random money transfers to a few validators.

use {
    crate::{
        config::ClientConfig,
        message::{Envelope, Outbox},
    },
    log::*,
    rand::{seq::IteratorRandom, Rng},
    rand_chacha::ChaCha8Rng,
    tendersim_consensus_bft::{NodeId, Transaction},
};

const MAX_AMOUNT: u64 = 1000;
const MAX_FEES: u64 = 10;

pub struct ClientActor {
    id: NodeId,
    config: ClientConfig,
    seed_nodes: Vec<NodeId>,
    rng: ChaCha8Rng,
    /// Validators known from discovery.
    validators: Vec<NodeId>,
    /// Validators this client sends to.
    connections: Vec<NodeId>,
    rounds_sent: usize,
    sent: Vec<Transaction>,
}

impl ClientActor {
    pub fn new(id: NodeId, config: ClientConfig, seed_nodes: Vec<NodeId>, rng: ChaCha8Rng) -> Self {
        Self {
            id,
            config,
            seed_nodes,
            rng,
            validators: Vec::new(),
            connections: Vec::new(),
            rounds_sent: 0,
            sent: Vec::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn connections(&self) -> &[NodeId] {
        &self.connections
    }

    /// Every transaction this client sent, in order.
    pub fn sent(&self) -> &[Transaction] {
        &self.sent
    }

    pub fn into_sent(self) -> Vec<Transaction> {
        self.sent
    }

    pub fn is_done(&self) -> bool {
        self.rounds_sent >= self.config.nb_sending_tx
    }

    pub fn directory_requests(&self) -> Outbox {
        self.seed_nodes
            .iter()
            .map(|seed| (*seed, Envelope::GetNodeDirectory))
            .collect()
    }

    /// Ticks until the next sending round.
    pub fn next_delay(&mut self) -> u64 {
        self.rng.random_range(
            self.config.min_time_between_sending..=self.config.max_time_between_sending,
        )
    }

    pub fn handle(&mut self, from: NodeId, envelope: Envelope) -> Outbox {
        match envelope {
            Envelope::NodeDirectory(directory) => {
                self.validators = directory.validators.into_iter().collect();
                self.connect();
            }
            other => {
                warn!(
                    "{} received unexpected {} envelope from {from}",
                    self.id,
                    other.kind()
                );
            }
        }
        Vec::new()
    }

    /// One sending round. Returns the envelopes to send and whether the
    /// client wants another round.
    pub fn on_tick(&mut self, now: u64) -> (Outbox, bool) {
        if self.is_done() {
            return (Vec::new(), false);
        }
        self.rounds_sent += 1;
        if self.connections.is_empty() {
            debug!("{} has no validator to send to", self.id);
            return (Vec::new(), !self.is_done());
        }

        let count = self
            .rng
            .random_range(self.config.min_tx_created..=self.config.max_tx_created);
        let mut outbox = Vec::with_capacity(count * self.connections.len());
        for _ in 0..count {
            let tx = self.make_transfer(now);
            outbox.extend(
                self.connections
                    .iter()
                    .map(|validator| (*validator, Envelope::TransactionGossip(tx.clone()))),
            );
            self.sent.push(tx);
        }
        trace!(
            "{} round {} sent {count} transactions",
            self.id,
            self.rounds_sent
        );
        (outbox, !self.is_done())
    }

    fn connect(&mut self) {
        let wanted = self.config.nb_connection_to_validator.min(self.validators.len());
        let mut connections = self
            .validators
            .iter()
            .copied()
            .choose_multiple(&mut self.rng, wanted);
        connections.sort_unstable();
        debug!("{} connected to {:?}", self.id, connections);
        self.connections = connections;
    }

    fn make_transfer(&mut self, now: u64) -> Transaction {
        let receiver = self
            .validators
            .iter()
            .choose(&mut self.rng)
            .map_or_else(|| self.id.address(), NodeId::address);
        let amount = self.rng.random_range(1..=MAX_AMOUNT);
        let fees = self.rng.random_range(1..=MAX_FEES);
        Transaction::money_transfer(now.max(1), self.id.address(), receiver, amount, fees)
    }
}
