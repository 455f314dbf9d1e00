//! The eight quorum rules.
//!
//! Each rule is a pure check of the engine state against the triggering
//! message. A rule that holds yields a [`Firing`], which the engine applies.
//! Whether a once-per-stage rule already fired is tracked by the engine,
//! keyed by `(rule, stage)`.

use {
    super::ConsensusEngine,
    crate::types::{Block, ConsensusMessage, ConsensusStep, Stage, ValueId},
    std::sync::Arc,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Rule {
    /// Prevote on a fresh proposal of the current round.
    ProposalForRound,
    /// Prevote on a re-proposal backed by a prevote quorum in its valid round.
    ProposalAndPrevoteForValidRound,
    /// Arm the prevote timeout on any prevote quorum.
    PrevoteForRound,
    /// Precommit nil on a nil prevote quorum.
    PrevoteNilForRound,
    /// Lock and precommit on a prevote quorum for the proposal.
    ProposalAndPrevoteForRound,
    /// Arm the precommit timeout on any precommit quorum.
    PrecommitForRound,
    /// Commit on a precommit quorum for a proposal of this height.
    ProposalAndPrecommitForRound,
    /// Skip to a later round with weak support.
    ChangeRound,
}

impl Rule {
    /// Evaluation order.
    pub const ALL: [Rule; 8] = [
        Rule::ProposalForRound,
        Rule::ProposalAndPrevoteForValidRound,
        Rule::PrevoteForRound,
        Rule::PrevoteNilForRound,
        Rule::ProposalAndPrevoteForRound,
        Rule::PrecommitForRound,
        Rule::ProposalAndPrecommitForRound,
        Rule::ChangeRound,
    ];

    pub fn once_per_stage(self) -> bool {
        matches!(
            self,
            Rule::PrevoteForRound | Rule::ProposalAndPrevoteForRound | Rule::PrecommitForRound
        )
    }
}

/// The effect of a rule that holds.
#[derive(Debug)]
pub(super) enum Firing {
    Prevote(Option<ValueId>),
    ArmTimeout(ConsensusStep),
    PrecommitNil,
    LockAndPrecommit(Arc<Block>),
    Commit(Arc<Block>),
    ChangeRound(u32),
}

impl ConsensusEngine {
    pub(super) fn evaluate(&self, rule: Rule, message: &ConsensusMessage) -> Option<Firing> {
        match rule {
            Rule::ProposalForRound => self.proposal_for_round(message),
            Rule::ProposalAndPrevoteForValidRound => {
                self.proposal_and_prevote_for_valid_round(message)
            }
            Rule::PrevoteForRound => self.prevote_for_round(message),
            Rule::PrevoteNilForRound => self.prevote_nil_for_round(message),
            Rule::ProposalAndPrevoteForRound => self.proposal_and_prevote_for_round(message),
            Rule::PrecommitForRound => self.precommit_for_round(message),
            Rule::ProposalAndPrecommitForRound => {
                self.proposal_and_precommit_for_round(message)
            }
            Rule::ChangeRound => self.change_round(message),
        }
    }

    /// A value is valid only for the height being decided.
    fn is_valid(&self, block: &Block) -> bool {
        block.height() == self.height()
    }

    /// The prevote a validator locked at `locked_round` may cast for `block`,
    /// given that the block is justified from `justified_round` (`None` for
    /// a fresh proposal).
    fn prevote_value(&self, block: &Block, justified_round: Option<u32>) -> Option<ValueId> {
        let unlocked = match (self.state.locked_round, justified_round) {
            (None, _) => true,
            (Some(locked_round), Some(valid_round)) => locked_round <= valid_round,
            (Some(_), None) => false,
        };
        let acceptable = unlocked || self.state.is_locked_on(block.value_id());
        (self.is_valid(block) && acceptable).then(|| block.value_id().clone())
    }

    /// The recorded proposal of `stage`, if its value is `value`.
    fn proposal_matching(&self, stage: Stage, value: &ValueId) -> Option<Arc<Block>> {
        self.votes
            .proposal(stage)
            .filter(|proposal| proposal.block.value_id() == value)
            .map(|proposal| proposal.block.clone())
    }

    fn proposal_for_round(&self, message: &ConsensusMessage) -> Option<Firing> {
        let ConsensusMessage::Proposal {
            block,
            valid_round: None,
            ..
        } = message
        else {
            return None;
        };
        if self.state.step != ConsensusStep::Propose || message.stage() != self.stage() {
            return None;
        }
        Some(Firing::Prevote(self.prevote_value(block, None)))
    }

    fn proposal_and_prevote_for_valid_round(&self, message: &ConsensusMessage) -> Option<Firing> {
        let stage = self.stage();
        let (block, valid_round) = match message {
            ConsensusMessage::Proposal {
                block,
                valid_round: Some(valid_round),
                ..
            } if message.stage() == stage => (block.clone(), *valid_round),
            ConsensusMessage::Prevote {
                height,
                round,
                value: Some(value),
                ..
            } if *height == stage.height => {
                let proposal = self.votes.proposal(stage)?;
                if proposal.valid_round != Some(*round) || proposal.block.value_id() != value {
                    return None;
                }
                (proposal.block.clone(), *round)
            }
            _ => return None,
        };
        if self.state.step != ConsensusStep::Propose || valid_round >= stage.round {
            return None;
        }
        let support = self
            .votes
            .prevotes_for(Stage::new(stage.height, valid_round), Some(block.value_id()));
        if support < self.committee.quorum() {
            return None;
        }
        Some(Firing::Prevote(self.prevote_value(&block, Some(valid_round))))
    }

    fn prevote_for_round(&self, message: &ConsensusMessage) -> Option<Firing> {
        let stage = self.stage();
        let ConsensusMessage::Prevote { .. } = message else {
            return None;
        };
        if message.stage() != stage || self.state.step != ConsensusStep::Prevote {
            return None;
        }
        (self.votes.total_prevotes(stage) >= self.committee.quorum())
            .then_some(Firing::ArmTimeout(ConsensusStep::Prevote))
    }

    fn prevote_nil_for_round(&self, message: &ConsensusMessage) -> Option<Firing> {
        let stage = self.stage();
        let ConsensusMessage::Prevote { .. } = message else {
            return None;
        };
        if message.stage() != stage || self.state.step != ConsensusStep::Prevote {
            return None;
        }
        (self.votes.prevotes_for(stage, None) >= self.committee.quorum())
            .then_some(Firing::PrecommitNil)
    }

    fn proposal_and_prevote_for_round(&self, message: &ConsensusMessage) -> Option<Firing> {
        let stage = self.stage();
        if message.stage() != stage {
            return None;
        }
        let block = match message {
            ConsensusMessage::Proposal { block, .. } => block.clone(),
            ConsensusMessage::Prevote {
                value: Some(value),
                ..
            } => self.proposal_matching(stage, value)?,
            _ => return None,
        };
        if !matches!(
            self.state.step,
            ConsensusStep::Prevote | ConsensusStep::Precommit
        ) || !self.is_valid(&block)
        {
            return None;
        }
        (self.votes.prevotes_for(stage, Some(block.value_id())) >= self.committee.quorum())
            .then_some(Firing::LockAndPrecommit(block))
    }

    fn precommit_for_round(&self, message: &ConsensusMessage) -> Option<Firing> {
        let stage = self.stage();
        let ConsensusMessage::Precommit { .. } = message else {
            return None;
        };
        if message.stage() != stage {
            return None;
        }
        (self.votes.total_precommits(stage) >= self.committee.quorum())
            .then_some(Firing::ArmTimeout(ConsensusStep::Precommit))
    }

    /// Any round of the current height may commit.
    fn proposal_and_precommit_for_round(&self, message: &ConsensusMessage) -> Option<Firing> {
        let height = self.height();
        let stage = message.stage();
        if stage.height != height || self.ledger.has_block(height) {
            return None;
        }
        let block = match message {
            ConsensusMessage::Proposal { block, .. } => block.clone(),
            ConsensusMessage::Precommit {
                value: Some(value),
                ..
            } => self.proposal_matching(stage, value)?,
            _ => return None,
        };
        if self.votes.precommits_for(stage, Some(block.value_id())) < self.committee.quorum() {
            return None;
        }
        self.is_valid(&block).then_some(Firing::Commit(block))
    }

    fn change_round(&self, message: &ConsensusMessage) -> Option<Firing> {
        let stage = message.stage();
        if stage.height != self.height() || stage.round <= self.state.round {
            return None;
        }
        (self.votes.messages_at(stage) >= self.committee.weak_support())
            .then_some(Firing::ChangeRound(stage.round))
    }
}
