//! Error types for the simulation harness.

use {
    tendersim_consensus_bft::{ConfigError, EngineError},
    thiserror::Error,
};

/// Errors that can occur while setting up or running a simulation.
#[derive(Error, Debug)]
pub enum SimulationError {
    /// The consensus configuration is out of range.
    #[error("invalid consensus configuration: {0}")]
    Config(#[from] ConfigError),

    /// A harness-level setting is out of range.
    #[error("invalid simulation configuration: {0}")]
    InvalidSimulationConfig(String),

    /// The configuration file could not be read.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid TOML for this schema.
    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A validator's engine rejected an event.
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
}

/// Errors computing aggregate statistics over a finished run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReportError {
    #[error("no validators found")]
    NoValidators,
}

/// Convenience result type for simulation operations.
pub type Result<T> = std::result::Result<T, SimulationError>;
