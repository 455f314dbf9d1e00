//! Validator actor: a consensus engine wired to the simulated network.

use {
    crate::message::{Envelope, NodeKind, NodeRegistration, Outbox},
    log::*,
    std::sync::Arc,
    tendersim_consensus_bft::{
        error::Result, BftConfig, Block, ConsensusEngine, EngineOutput, Ledger, NodeId,
        ScheduledTimeout, TimeoutEvent,
    },
};

/// What the runner must do after a validator handled an event.
#[derive(Debug, Default)]
pub struct ValidatorOutput {
    pub outbox: Outbox,
    pub timeouts: Vec<ScheduledTimeout>,
    pub committed: Vec<Arc<Block>>,
    pub halted: bool,
}

pub struct ValidatorActor {
    engine: ConsensusEngine,
    seed_nodes: Vec<NodeId>,
}

impl ValidatorActor {
    pub fn new(config: BftConfig, id: NodeId, ledger: Ledger, seed_nodes: Vec<NodeId>) -> Self {
        Self {
            engine: ConsensusEngine::new(config, id, ledger),
            seed_nodes,
        }
    }

    pub fn id(&self) -> NodeId {
        self.engine.identity()
    }

    pub fn engine(&self) -> &ConsensusEngine {
        &self.engine
    }

    pub fn into_engine(self) -> ConsensusEngine {
        self.engine
    }

    /// Registration with every seed node.
    pub fn registrations(&self) -> Outbox {
        let registration = NodeRegistration {
            agent: self.id(),
            kind: NodeKind::Validator,
        };
        self.seed_nodes
            .iter()
            .map(|seed| (*seed, Envelope::NodeRegistration(registration.clone())))
            .collect()
    }

    /// Directory request to every seed node.
    pub fn directory_requests(&self) -> Outbox {
        self.seed_nodes
            .iter()
            .map(|seed| (*seed, Envelope::GetNodeDirectory))
            .collect()
    }

    pub fn start(&mut self, now: u64) -> Result<ValidatorOutput> {
        let output = self.engine.start(now)?;
        Ok(self.route(output))
    }

    pub fn on_timeout(&mut self, event: TimeoutEvent, now: u64) -> Result<ValidatorOutput> {
        let output = self.engine.on_timeout(event, now)?;
        Ok(self.route(output))
    }

    /// Handle an envelope delivered from `from`.
    pub fn handle(
        &mut self,
        from: NodeId,
        envelope: Envelope,
        now: u64,
    ) -> Result<ValidatorOutput> {
        match envelope {
            Envelope::Consensus(message) => {
                if message.sender() != from {
                    debug!(
                        "{} dropping {message} relayed by {from} on behalf of {}",
                        self.id(),
                        message.sender()
                    );
                    return Ok(ValidatorOutput::default());
                }
                let output = self.engine.on_message(message, now)?;
                Ok(self.route(output))
            }
            Envelope::TransactionGossip(tx) => {
                let output = self.engine.on_transaction(tx)?;
                Ok(self.route(output))
            }
            Envelope::NodeDirectory(directory) => {
                let learned = self
                    .engine
                    .learn_validators(directory.validators.iter().copied());
                debug!(
                    "{} learned {learned} validators from {from}, knows {}",
                    self.id(),
                    self.engine.directory().len()
                );
                Ok(ValidatorOutput::default())
            }
            other @ (Envelope::NodeRegistration(_) | Envelope::GetNodeDirectory) => {
                warn!(
                    "{} received unexpected {} envelope from {from}",
                    self.id(),
                    other.kind()
                );
                Ok(ValidatorOutput::default())
            }
        }
    }

    /// Consensus messages go to every known validator, self included.
    /// Gossip goes to the other committee members.
    fn route(&self, output: EngineOutput) -> ValidatorOutput {
        let EngineOutput {
            messages,
            timeouts,
            gossip,
            committed,
            halted,
        } = output;
        let id = self.id();
        let validators = self.engine.directory().ids();
        let mut outbox = Vec::with_capacity(messages.len() * validators.len());
        for message in messages {
            outbox.extend(
                validators
                    .iter()
                    .map(|to| (*to, Envelope::Consensus(message.clone()))),
            );
        }
        for tx in gossip {
            outbox.extend(
                self.engine
                    .committee()
                    .members()
                    .iter()
                    .filter(|member| **member != id)
                    .map(|member| (*member, Envelope::TransactionGossip(tx.clone()))),
            );
        }
        ValidatorOutput {
            outbox,
            timeouts,
            committed,
            halted,
        }
    }
}
