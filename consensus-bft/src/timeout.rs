//! Step timeouts and their escalation.
//!
//! Each step keeps its own current timeout. A timeout that fires at round
//! `r` grows by `r * delta_timeout`, and all three return to their base
//! values when a height commits.

use crate::{config::BftConfig, types::ConsensusStep};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeoutSchedule {
    base_propose: u64,
    base_prevote: u64,
    base_precommit: u64,
    delta: u64,
    propose: u64,
    prevote: u64,
    precommit: u64,
}

impl TimeoutSchedule {
    pub fn new(config: &BftConfig) -> Self {
        Self {
            base_propose: config.timeout_propose,
            base_prevote: config.timeout_prevote,
            base_precommit: config.timeout_precommit,
            delta: config.delta_timeout,
            propose: config.timeout_propose,
            prevote: config.timeout_prevote,
            precommit: config.timeout_precommit,
        }
    }

    /// Current timeout of `step`, in ticks.
    pub fn duration(&self, step: ConsensusStep) -> u64 {
        match step {
            ConsensusStep::Propose => self.propose,
            ConsensusStep::Prevote => self.prevote,
            ConsensusStep::Precommit => self.precommit,
        }
    }

    /// Grow the timeout of `step` after it fired at `round`.
    pub fn escalate(&mut self, step: ConsensusStep, round: u32) {
        let increase = u64::from(round).saturating_mul(self.delta);
        let timeout = match step {
            ConsensusStep::Propose => &mut self.propose,
            ConsensusStep::Prevote => &mut self.prevote,
            ConsensusStep::Precommit => &mut self.precommit,
        };
        *timeout = timeout.saturating_add(increase);
    }

    /// Return every timeout to its base value.
    pub fn reset(&mut self) {
        self.propose = self.base_propose;
        self.prevote = self.base_prevote;
        self.precommit = self.base_precommit;
    }

    pub fn propose(&self) -> u64 {
        self.propose
    }

    pub fn prevote(&self) -> u64 {
        self.prevote
    }

    pub fn precommit(&self) -> u64 {
        self.precommit
    }
}
