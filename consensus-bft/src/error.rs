//! Error types of the consensus core.

use thiserror::Error;

/// Errors raised by the block ledger.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("block height {actual} does not extend the ledger, expected {expected}")]
    HeightMismatch { expected: u64, actual: u64 },

    #[error("block at height {height} does not link to its predecessor")]
    BrokenLink { height: u64 },
}

/// Errors raised by the consensus engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("engine received an event before it was started")]
    NotStarted,

    #[error("engine was already started")]
    AlreadyStarted,

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

pub type Result<T> = std::result::Result<T, EngineError>;
