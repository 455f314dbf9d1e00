//! Discrete-event simulation harness for the committee consensus engine.
//!
//! Wires validator, seed and client actors over a simulated network with
//! seeded latency and loss, runs them on a single logical clock, and
//! verifies and summarizes the resulting chains.
//!
//! ```text
//!   ClientActor ──tx──▶ ValidatorActor ◀──consensus──▶ ValidatorActor
//!                         │    ▲
//!              register / │    │ directory
//!                         ▼    │
//!                        SeedNode
//!
//!   Simulation: Scheduler (time, seq) ─▶ SimulatedNetwork ─▶ actors
//!   SimulationReport: verification + statistics over the final ledgers
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod genesis;
pub mod message;
pub mod network;
pub mod report;
pub mod runner;
pub mod scheduler;
pub mod seed;
pub mod validator;

pub use {
    config::{
        ActorCounts, ClientConfig, DiscoveryConfig, GenesisConfig, NetworkConfig, SimulationConfig,
    },
    error::{ReportError, SimulationError},
    message::{Envelope, NodeDirectory, NodeKind, NodeRegistration},
    report::{verify_blockchains, ChainVerification, SimulationReport},
    runner::{Simulation, SimulationOutcome, SimulationStats, StopReason},
};
