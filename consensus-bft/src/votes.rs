//! Per-stage proposal and vote bookkeeping.
//!
//! A sender is counted at most once per stage and vote kind. Counters are
//! kept per (stage, value) so quorum checks are lookups.

use {
    crate::types::{Block, ConsensusMessage, NodeId, Stage, ValueId},
    std::{
        collections::{HashMap, HashSet},
        sync::Arc,
    },
};

/// A proposal accepted from the legitimate proposer of its stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedProposal {
    pub proposer: NodeId,
    pub block: Arc<Block>,
    pub valid_round: Option<u32>,
}

impl RecordedProposal {
    pub fn to_message(&self, stage: Stage) -> ConsensusMessage {
        ConsensusMessage::Proposal {
            height: stage.height,
            round: stage.round,
            block: self.block.clone(),
            proposer: self.proposer,
            valid_round: self.valid_round,
        }
    }
}

/// Votes of one kind (prevote or precommit).
#[derive(Debug, Default, Clone)]
struct Tally {
    voters: HashMap<Stage, HashSet<NodeId>>,
    counts: HashMap<(Stage, Option<ValueId>), usize>,
}

impl Tally {
    fn record(&mut self, stage: Stage, voter: NodeId, value: Option<ValueId>) -> bool {
        if !self.voters.entry(stage).or_default().insert(voter) {
            return false;
        }
        *self.counts.entry((stage, value)).or_insert(0) += 1;
        true
    }

    fn count_for(&self, stage: Stage, value: Option<&ValueId>) -> usize {
        self.counts
            .get(&(stage, value.cloned()))
            .copied()
            .unwrap_or(0)
    }

    fn total(&self, stage: Stage) -> usize {
        self.voters.get(&stage).map_or(0, HashSet::len)
    }

    fn prune_through(&mut self, height: u64) {
        self.voters.retain(|stage, _| stage.height > height);
        self.counts.retain(|(stage, _), _| stage.height > height);
    }
}

#[derive(Debug, Default, Clone)]
pub struct VoteBook {
    proposals: HashMap<Stage, RecordedProposal>,
    prevotes: Tally,
    precommits: Tally,
}

impl VoteBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep the first proposal of a stage. Returns whether it was new.
    pub fn record_proposal(&mut self, stage: Stage, proposal: RecordedProposal) -> bool {
        if self.proposals.contains_key(&stage) {
            return false;
        }
        self.proposals.insert(stage, proposal);
        true
    }

    /// Returns `false` if `voter` already prevoted at `stage`.
    pub fn record_prevote(&mut self, stage: Stage, voter: NodeId, value: Option<ValueId>) -> bool {
        self.prevotes.record(stage, voter, value)
    }

    /// Returns `false` if `voter` already precommitted at `stage`.
    pub fn record_precommit(
        &mut self,
        stage: Stage,
        voter: NodeId,
        value: Option<ValueId>,
    ) -> bool {
        self.precommits.record(stage, voter, value)
    }

    pub fn proposal(&self, stage: Stage) -> Option<&RecordedProposal> {
        self.proposals.get(&stage)
    }

    /// Prevotes at `stage` for `value` (`None` counts nil votes).
    pub fn prevotes_for(&self, stage: Stage, value: Option<&ValueId>) -> usize {
        self.prevotes.count_for(stage, value)
    }

    pub fn precommits_for(&self, stage: Stage, value: Option<&ValueId>) -> usize {
        self.precommits.count_for(stage, value)
    }

    /// Prevotes at `stage` for any value, nil included.
    pub fn total_prevotes(&self, stage: Stage) -> usize {
        self.prevotes.total(stage)
    }

    pub fn total_precommits(&self, stage: Stage) -> usize {
        self.precommits.total(stage)
    }

    /// Proposals, prevotes and precommits recorded at `stage`.
    pub fn messages_at(&self, stage: Stage) -> usize {
        usize::from(self.proposals.contains_key(&stage))
            + self.total_prevotes(stage)
            + self.total_precommits(stage)
    }

    /// Forget everything at or below `height`.
    pub fn prune_through(&mut self, height: u64) {
        self.proposals.retain(|stage, _| stage.height > height);
        self.prevotes.prune_through(height);
        self.precommits.prune_through(height);
    }
}
