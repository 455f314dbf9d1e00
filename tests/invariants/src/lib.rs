//! Tendersim Property-Based Invariant Tests
//!
//! Uses proptest to verify critical system invariants across:
//! - Committee thresholds, sampling and proposer rotation
//! - Consensus agreement and liveness under random scheduling
//! - Transaction pool bookkeeping

pub mod committee_invariants;
pub mod consensus_invariants;
pub mod pool_invariants;
