//! Consensus configuration.
//!
//! Defines the height horizon, block and committee sizes, and the base
//! timeouts (in logical ticks) of the round-based protocol.

use serde::{Deserialize, Serialize};

/// Smallest accepted `max_height`.
pub const MIN_MAX_HEIGHT: u64 = 5;
/// Smallest accepted `max_block_size`.
pub const MIN_MAX_BLOCK_SIZE: usize = 1;
/// Smallest accepted `committee_size`.
pub const MIN_COMMITTEE_SIZE: usize = 4;

/// Configuration for the consensus engine.
///
/// All timeouts are in logical scheduler ticks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BftConfig {
    /// Height after which the engine halts.
    /// Default: 100.
    pub max_height: u64,

    /// Maximum number of transactions a proposer puts in a block.
    /// Default: 50.
    pub max_block_size: usize,

    /// Number of addresses drawn from the stake table at every height.
    /// Default: 7.
    pub committee_size: usize,

    /// Base timeout of the propose step.
    /// Default: 25.
    pub timeout_propose: u64,

    /// Base timeout of the prevote step.
    /// Default: 25.
    pub timeout_prevote: u64,

    /// Base timeout of the precommit step.
    /// Default: 25.
    pub timeout_precommit: u64,

    /// Escalation step. A timeout firing at round `r` grows by `r * delta_timeout`.
    /// Default: 10.
    pub delta_timeout: u64,
}

impl Default for BftConfig {
    fn default() -> Self {
        Self {
            max_height: 100,
            max_block_size: 50,
            committee_size: 7,
            timeout_propose: 25,
            timeout_prevote: 25,
            timeout_precommit: 25,
            delta_timeout: 10,
        }
    }
}

impl BftConfig {
    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_height < MIN_MAX_HEIGHT {
            return Err(ConfigError::InvalidMaxHeight(self.max_height));
        }
        if self.max_block_size < MIN_MAX_BLOCK_SIZE {
            return Err(ConfigError::InvalidMaxBlockSize(self.max_block_size));
        }
        if self.committee_size < MIN_COMMITTEE_SIZE {
            return Err(ConfigError::InvalidCommitteeSize(self.committee_size));
        }
        if self.timeout_propose == 0 || self.timeout_prevote == 0 || self.timeout_precommit == 0
        {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }
}

/// Errors in consensus configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("max_height must be >= {MIN_MAX_HEIGHT}, got {0}")]
    InvalidMaxHeight(u64),
    #[error("max_block_size must be >= {MIN_MAX_BLOCK_SIZE}, got {0}")]
    InvalidMaxBlockSize(usize),
    #[error("committee_size must be >= {MIN_COMMITTEE_SIZE}, got {0}")]
    InvalidCommitteeSize(usize),
    #[error("base timeouts must be > 0")]
    ZeroTimeout,
}
