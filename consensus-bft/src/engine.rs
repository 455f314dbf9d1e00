//! The per-validator consensus state machine.
//!
//! Implements the Tendermint round structure (Propose → Prevote →
//! Precommit → Commit) over a committee that is re-sampled from the stake
//! table at every height.
//!
//! The engine is deterministic and performs no I/O. Every entry point
//! returns an [`EngineOutput`] listing the messages to broadcast, the
//! timers to arm and the blocks committed while handling the event; the
//! caller owns delivery.

mod rules;

pub use self::rules::Rule;

use {
    self::rules::Firing,
    crate::{
        committee::{Committee, ValidatorDirectory},
        config::BftConfig,
        error::{EngineError, Result},
        ledger::Ledger,
        mempool::TransactionPool,
        proposer,
        sampler::{CommitteeSelector, SimpleCommitteeSelector},
        stake::ProofOfStakeState,
        timeout::TimeoutSchedule,
        transaction::Transaction,
        types::{
            Block, ConsensusMessage, ConsensusState, ConsensusStep, NodeId, Stage,
            TimeoutEvent, ValueId,
        },
        votes::{RecordedProposal, VoteBook},
    },
    log::*,
    rand::SeedableRng,
    rand_chacha::ChaCha8Rng,
    std::{
        collections::{BTreeMap, HashSet, VecDeque},
        sync::Arc,
    },
};

/// Upper bound on messages held for the next height.
pub const MAX_BUFFERED_MESSAGES: usize = 10_000;

/// A timer the caller must arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledTimeout {
    pub event: TimeoutEvent,
    /// Delay in ticks from the current time.
    pub delay: u64,
}

/// Result of processing a consensus event.
#[derive(Debug, Default)]
pub struct EngineOutput {
    /// Messages to broadcast to the validators.
    pub messages: Vec<ConsensusMessage>,
    /// Timers to arm.
    pub timeouts: Vec<ScheduledTimeout>,
    /// Newly pooled transactions to gossip to the committee.
    pub gossip: Vec<Transaction>,
    /// Blocks committed while handling the event, in height order.
    pub committed: Vec<Arc<Block>>,
    /// Set once the engine passed its maximum height.
    pub halted: bool,
}

impl EngineOutput {
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
            && self.timeouts.is_empty()
            && self.gossip.is_empty()
            && self.committed.is_empty()
            && !self.halted
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Idle,
    Running,
    Halted,
}

/// A message waiting to run through the rules.
enum Pending {
    /// Not yet checked or recorded.
    Fresh(ConsensusMessage),
    /// An already recorded proposal, re-run after entering its round.
    Replay(ConsensusMessage),
}

/// The consensus engine of one validator.
pub struct ConsensusEngine {
    config: BftConfig,
    identity: NodeId,
    lifecycle: Lifecycle,
    ledger: Ledger,
    stake: ProofOfStakeState,
    mempool: TransactionPool,
    /// Every transaction in `ledger`.
    committed_txs: HashSet<Transaction>,
    directory: ValidatorDirectory,
    /// Committee of the current height.
    committee: Committee,
    state: ConsensusState,
    votes: VoteBook,
    /// Once-per-stage rules that already fired.
    fired: HashSet<(Rule, Stage)>,
    timeouts: TimeoutSchedule,
    /// Messages for the next height, replayed after the local commit.
    future: Vec<ConsensusMessage>,
    /// Round in which each height committed.
    height_rounds: BTreeMap<u64, u32>,
}

impl ConsensusEngine {
    /// Create an engine on top of `ledger`. The stake table is rebuilt from
    /// the chain. The engine does nothing until [`ConsensusEngine::start`].
    pub fn new(config: BftConfig, identity: NodeId, ledger: Ledger) -> Self {
        let stake = ProofOfStakeState::from_ledger(&ledger);
        let committed_txs = ledger
            .iter()
            .flat_map(|block| block.transactions().iter().cloned())
            .collect();
        let mut directory = ValidatorDirectory::new();
        directory.merge([identity]);
        Self {
            timeouts: TimeoutSchedule::new(&config),
            config,
            identity,
            lifecycle: Lifecycle::Idle,
            ledger,
            stake,
            mempool: TransactionPool::new(),
            committed_txs,
            directory,
            committee: Committee::default(),
            state: ConsensusState::new(),
            votes: VoteBook::new(),
            fired: HashSet::new(),
            future: Vec::new(),
            height_rounds: BTreeMap::new(),
        }
    }

    // -- Public API --

    /// Union `validators` into the known-validator directory. Takes effect
    /// at the next committee computation. Returns how many were new.
    pub fn learn_validators<I: IntoIterator<Item = NodeId>>(&mut self, validators: I) -> usize {
        self.directory.merge(validators)
    }

    /// Sample the first committee and start round 0.
    pub fn start(&mut self, now: u64) -> Result<EngineOutput> {
        if self.lifecycle != Lifecycle::Idle {
            return Err(EngineError::AlreadyStarted);
        }
        self.lifecycle = Lifecycle::Running;
        self.recompute_committee();
        info!(
            "{} starting consensus at height {} with {} known validators",
            self.identity,
            self.height(),
            self.directory.len()
        );
        let mut output = EngineOutput::default();
        self.start_round(0, now, &mut output);
        Ok(output)
    }

    /// Process a proposal, prevote or precommit.
    pub fn on_message(&mut self, message: ConsensusMessage, now: u64) -> Result<EngineOutput> {
        self.ensure_started()?;
        let mut output = EngineOutput::default();
        if self.lifecycle == Lifecycle::Halted {
            trace!("{} halted, ignoring {message}", self.identity);
            return Ok(output);
        }
        self.drive(VecDeque::from([Pending::Fresh(message)]), now, &mut output)?;
        Ok(output)
    }

    /// Handle a fired timer. Timers armed for an earlier stage or step are
    /// ignored.
    pub fn on_timeout(&mut self, event: TimeoutEvent, now: u64) -> Result<EngineOutput> {
        self.ensure_started()?;
        let mut output = EngineOutput::default();
        if self.lifecycle == Lifecycle::Halted {
            return Ok(output);
        }
        let position = self.position();
        if !self.handle_timeout(event, now, &mut output) {
            return Ok(output);
        }
        let mut queue = VecDeque::new();
        self.queue_replays(position, &mut queue);
        self.drive(queue, now, &mut output)?;
        Ok(output)
    }

    /// Offer a client or gossiped transaction to the pool. A transaction
    /// that is new to the pool is handed back for gossip.
    pub fn on_transaction(&mut self, tx: Transaction) -> Result<EngineOutput> {
        self.ensure_started()?;
        let mut output = EngineOutput::default();
        if self.committed_txs.contains(&tx) {
            trace!("{} ignoring committed transaction {tx}", self.identity);
            return Ok(output);
        }
        if self.mempool.submit(tx.clone()) {
            output.gossip.push(tx);
        }
        Ok(output)
    }

    /// Check if this validator proposes at `(height, round)`.
    pub fn is_proposer(&self, height: u64, round: u32) -> bool {
        proposer::is_proposer(&self.committee, &self.identity, height, round)
    }

    // -- Accessors --

    pub fn identity(&self) -> NodeId {
        self.identity
    }

    pub fn address(&self) -> String {
        self.identity.address()
    }

    /// The height being decided: one above the ledger's.
    pub fn height(&self) -> u64 {
        self.ledger.current_height().saturating_add(1)
    }

    pub fn round(&self) -> u32 {
        self.state.round
    }

    pub fn step(&self) -> ConsensusStep {
        self.state.step
    }

    pub fn stage(&self) -> Stage {
        Stage::new(self.height(), self.state.round)
    }

    pub fn state(&self) -> &ConsensusState {
        &self.state
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn mempool(&self) -> &TransactionPool {
        &self.mempool
    }

    pub fn stake(&self) -> &ProofOfStakeState {
        &self.stake
    }

    pub fn committee(&self) -> &Committee {
        &self.committee
    }

    pub fn directory(&self) -> &ValidatorDirectory {
        &self.directory
    }

    pub fn is_committee_member(&self) -> bool {
        self.committee.contains(&self.identity)
    }

    pub fn timeouts(&self) -> &TimeoutSchedule {
        &self.timeouts
    }

    /// Round in which each height committed.
    pub fn height_rounds(&self) -> &BTreeMap<u64, u32> {
        &self.height_rounds
    }

    pub fn has_fired(&self, rule: Rule, stage: Stage) -> bool {
        self.fired.contains(&(rule, stage))
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle == Lifecycle::Running
    }

    pub fn is_halted(&self) -> bool {
        self.lifecycle == Lifecycle::Halted
    }

    pub fn config(&self) -> &BftConfig {
        &self.config
    }

    // -- Internal logic --

    fn ensure_started(&self) -> Result<()> {
        if self.lifecycle == Lifecycle::Idle {
            error!("{} received an event before it was started", self.identity);
            return Err(EngineError::NotStarted);
        }
        Ok(())
    }

    fn position(&self) -> (u64, u32) {
        (self.height(), self.state.round)
    }

    /// Run queued messages through the rules until the queue drains.
    fn drive(
        &mut self,
        mut queue: VecDeque<Pending>,
        now: u64,
        output: &mut EngineOutput,
    ) -> Result<()> {
        while let Some(pending) = queue.pop_front() {
            if self.lifecycle != Lifecycle::Running {
                break;
            }
            let message = match pending {
                Pending::Fresh(message) => {
                    if !self.admit(&message) {
                        continue;
                    }
                    message
                }
                Pending::Replay(message) => message,
            };
            let position = self.position();
            self.execute_rules(&message, now, output)?;
            self.queue_replays(position, &mut queue);
        }
        Ok(())
    }

    /// After a height change, release the buffered messages of the new
    /// height. After a round change, re-run that round's recorded proposal.
    fn queue_replays(&mut self, before: (u64, u32), queue: &mut VecDeque<Pending>) {
        let height = self.height();
        if height != before.0 {
            let (ready, later): (Vec<_>, Vec<_>) = std::mem::take(&mut self.future)
                .into_iter()
                .partition(|message| message.height() == height);
            self.future = later
                .into_iter()
                .filter(|message| message.height() > height)
                .collect();
            queue.extend(ready.into_iter().map(Pending::Fresh));
        } else if self.state.round != before.1 {
            let stage = self.stage();
            if let Some(proposal) = self.votes.proposal(stage) {
                queue.push_back(Pending::Replay(proposal.to_message(stage)));
            }
        }
    }

    /// Height, membership, proposer and duplicate checks. Records the
    /// message if it passes.
    fn admit(&mut self, message: &ConsensusMessage) -> bool {
        let height = self.height();
        let stage = message.stage();
        if stage.height < height {
            trace!("{} dropping stale {message}", self.identity);
            return false;
        }
        if stage.height > height {
            if stage.height == height.saturating_add(1)
                && self.future.len() < MAX_BUFFERED_MESSAGES
            {
                self.future.push(message.clone());
            } else {
                debug!("{} dropping far-future {message}", self.identity);
            }
            return false;
        }

        let sender = message.sender();
        if !self.committee.contains(&sender) {
            debug!(
                "{} dropping {message}: {sender} is not in the committee",
                self.identity
            );
            return false;
        }

        match message {
            ConsensusMessage::Proposal {
                block,
                proposer,
                valid_round,
                ..
            } => {
                let expected = proposer::proposer_for_round(&self.committee, height, stage.round);
                if expected != Some(*proposer) {
                    warn!(
                        "{} rejecting proposal from {proposer} at {stage}, expected {expected:?}",
                        self.identity
                    );
                    return false;
                }
                let recorded = self.votes.record_proposal(
                    stage,
                    RecordedProposal {
                        proposer: *proposer,
                        block: block.clone(),
                        valid_round: *valid_round,
                    },
                );
                if !recorded {
                    debug!("{} duplicate proposal at {stage}", self.identity);
                }
                recorded
            }
            ConsensusMessage::Prevote { voter, value, .. } => {
                let recorded = self.votes.record_prevote(stage, *voter, value.clone());
                if !recorded {
                    debug!("{} duplicate prevote from {voter} at {stage}", self.identity);
                }
                recorded
            }
            ConsensusMessage::Precommit { voter, value, .. } => {
                let recorded = self.votes.record_precommit(stage, *voter, value.clone());
                if !recorded {
                    debug!(
                        "{} duplicate precommit from {voter} at {stage}",
                        self.identity
                    );
                }
                recorded
            }
        }
    }

    /// Try every rule against `message`, in order. Stops once the height
    /// changes or the engine halts.
    fn execute_rules(
        &mut self,
        message: &ConsensusMessage,
        now: u64,
        output: &mut EngineOutput,
    ) -> Result<()> {
        let height = self.height();
        for rule in Rule::ALL {
            if self.lifecycle != Lifecycle::Running || self.height() != height {
                break;
            }
            let Some(firing) = self.evaluate(rule, message) else {
                continue;
            };
            if rule.once_per_stage() && !self.fired.insert((rule, self.stage())) {
                continue;
            }
            debug!("{} {rule:?} fired at {} on {message}", self.identity, self.stage());
            self.apply(firing, now, output)?;
        }
        Ok(())
    }

    fn apply(&mut self, firing: Firing, now: u64, output: &mut EngineOutput) -> Result<()> {
        match firing {
            Firing::Prevote(value) => {
                self.broadcast_prevote(value, output);
                self.state.step = ConsensusStep::Prevote;
            }
            Firing::ArmTimeout(step) => self.arm_timeout(step, output),
            Firing::PrecommitNil => {
                self.broadcast_precommit(None, output);
                self.state.step = ConsensusStep::Precommit;
            }
            Firing::LockAndPrecommit(block) => {
                let round = self.state.round;
                if self.state.step == ConsensusStep::Prevote {
                    self.state.locked_value = Some(block.clone());
                    self.state.locked_round = Some(round);
                    self.broadcast_precommit(Some(block.value_id().clone()), output);
                    self.state.step = ConsensusStep::Precommit;
                }
                self.state.valid_value = Some(block);
                self.state.valid_round = Some(round);
            }
            Firing::Commit(block) => self.commit(block, now, output)?,
            Firing::ChangeRound(round) => self.start_round(round, now, output),
        }
        Ok(())
    }

    /// Enter `round` of the current height, or halt past the maximum height.
    fn start_round(&mut self, round: u32, now: u64, output: &mut EngineOutput) {
        let height = self.height();
        if height > self.config.max_height {
            info!(
                "{} reached max height {}, halting",
                self.identity, self.config.max_height
            );
            self.lifecycle = Lifecycle::Halted;
            output.halted = true;
            return;
        }

        debug!("{} starting round {round} at height {height}", self.identity);
        self.state.advance_round(round);

        if self.is_proposer(height, round) {
            let block = match &self.state.valid_value {
                Some(valid) => valid.clone(),
                None => Arc::new(self.next_value(now)),
            };
            info!(
                "{} proposing {} at h={height} r={round} with {} transactions",
                self.identity,
                block.value_id(),
                block.transactions().len()
            );
            output.messages.push(ConsensusMessage::Proposal {
                height,
                round,
                block,
                proposer: self.identity,
                valid_round: self.state.valid_round,
            });
        } else {
            self.arm_timeout(ConsensusStep::Propose, output);
        }
    }

    /// Build a fresh block on top of the ledger tip.
    fn next_value(&mut self, now: u64) -> Block {
        let previous = self.ledger.tip().sha256_base64_hash().to_string();
        let transactions = self.mempool.select_batch(self.config.max_block_size);
        Block::new(self.height(), now, previous, transactions)
    }

    fn handle_timeout(&mut self, event: TimeoutEvent, now: u64, output: &mut EngineOutput) -> bool {
        let stage = self.stage();
        if event.stage != stage {
            trace!("{} ignoring stale {:?} timeout", self.identity, event);
            return false;
        }
        let round = stage.round;
        match event.step {
            ConsensusStep::Propose => {
                if self.state.step != ConsensusStep::Propose {
                    return false;
                }
                debug!("{} propose timeout at {stage}", self.identity);
                self.timeouts.escalate(ConsensusStep::Propose, round);
                self.broadcast_prevote(None, output);
                self.state.step = ConsensusStep::Prevote;
            }
            ConsensusStep::Prevote => {
                if self.state.step != ConsensusStep::Prevote {
                    return false;
                }
                debug!("{} prevote timeout at {stage}", self.identity);
                self.timeouts.escalate(ConsensusStep::Prevote, round);
                self.broadcast_precommit(None, output);
                self.state.step = ConsensusStep::Precommit;
            }
            ConsensusStep::Precommit => {
                debug!("{} precommit timeout at {stage}", self.identity);
                self.timeouts.escalate(ConsensusStep::Precommit, round);
                self.start_round(round.saturating_add(1), now, output);
            }
        }
        true
    }

    /// Append `block`, settle the pool and stake table, and move to the
    /// next height.
    fn commit(&mut self, block: Arc<Block>, now: u64, output: &mut EngineOutput) -> Result<()> {
        let height = self.height();
        let round = self.state.round;
        self.ledger.add_block(block.clone())?;
        self.stake.apply_block(&block);
        self.mempool.reconcile(block.transactions());
        self.committed_txs
            .extend(block.transactions().iter().cloned());
        self.height_rounds.insert(height, round);

        self.votes.prune_through(height);
        self.fired.retain(|(_, stage)| stage.height > height);
        self.state = ConsensusState::new();
        self.timeouts.reset();

        info!(
            "{} committed {} at height {height} in round {round} ({} transactions)",
            self.identity,
            block.value_id(),
            block.transactions().len()
        );
        output.committed.push(block);

        self.recompute_committee();
        self.start_round(0, now, output);
        Ok(())
    }

    /// Draw the committee of the current height, seeded by the height.
    fn recompute_committee(&mut self) {
        let height = self.height();
        let mut rng = ChaCha8Rng::seed_from_u64(height);
        let addresses = SimpleCommitteeSelector.select_committee(
            &self.stake,
            self.config.committee_size,
            &mut rng,
        );
        self.committee = Committee::resolve(&addresses, &self.directory);
        if self.committee.len() < addresses.len() {
            warn!(
                "{} resolved only {} of {} committee addresses at height {height}",
                self.identity,
                self.committee.len(),
                addresses.len()
            );
        }
        debug!(
            "{} committee at height {height}: {:?}",
            self.identity,
            self.committee.members()
        );
    }

    fn arm_timeout(&self, step: ConsensusStep, output: &mut EngineOutput) {
        output.timeouts.push(ScheduledTimeout {
            event: TimeoutEvent {
                step,
                stage: self.stage(),
            },
            delay: self.timeouts.duration(step),
        });
    }

    fn broadcast_prevote(&self, value: Option<ValueId>, output: &mut EngineOutput) {
        if !self.is_committee_member() {
            return;
        }
        output.messages.push(ConsensusMessage::Prevote {
            height: self.height(),
            round: self.state.round,
            value,
            voter: self.identity,
        });
    }

    fn broadcast_precommit(&self, value: Option<ValueId>, output: &mut EngineOutput) {
        if !self.is_committee_member() {
            return;
        }
        output.messages.push(ConsensusMessage::Precommit {
            height: self.height(),
            round: self.state.round,
            value,
            voter: self.identity,
        });
    }
}
