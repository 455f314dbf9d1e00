//! Committee-based Tendermint consensus engine
//!
//! This crate implements the per-validator core of a Tendermint-style
//! Byzantine Fault Tolerant (BFT) consensus protocol in which the set of
//! participants is re-sampled from the stake table at every height:
//!
//! 1. **Propose**: the round's proposer (rotating over the committee)
//!    broadcasts a block built from its transaction pool.
//! 2. **Prevote**: committee members evaluate the proposal against their
//!    lock and broadcast a prevote for it or for nil.
//! 3. **Precommit**: on 2f+1 matching prevotes a member locks the value and
//!    broadcasts a precommit.
//! 4. **Commit**: on 2f+1 matching precommits the block is appended to the
//!    ledger, the stake table and pool are settled, and a new committee is
//!    drawn for the next height.
//!
//! # Key Properties
//!
//! - **Safety**: no two different blocks are committed at one height while
//!   fewer than a third of the committee is faulty.
//! - **Liveness**: escalating timeouts and the f+1 round-change rule move a
//!   stuck height forward.
//! - **Determinism**: the engine performs no I/O and draws committees from a
//!   height-seeded generator, so equal inputs give equal outputs.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                 ConsensusEngine                   │
//! │  ┌──────────┐  ┌─────────────┐  ┌─────────────┐  │
//! │  │ BftConfig│  │ Ledger      │  │ Transaction │  │
//! │  │          │  │             │  │ Pool        │  │
//! │  └──────────┘  └─────────────┘  └─────────────┘  │
//! │  ┌──────────────────┐  ┌──────────────────────┐  │
//! │  │ ProofOfStakeState│─▶│ CommitteeSelector    │  │
//! │  └──────────────────┘  └──────────────────────┘  │
//! │  ┌──────────────────────────────────────────┐    │
//! │  │ ConsensusState + VoteBook + rules        │    │
//! │  │ round, step, locks, votes, fired rules   │    │
//! │  └──────────────────────────────────────────┘    │
//! │  ┌──────────┐  ┌──────────────────┐              │
//! │  │ Proposer │  │ TimeoutSchedule  │              │
//! │  │ Selection│  │                  │              │
//! │  └──────────┘  └──────────────────┘              │
//! └──────────────────────────────────────────────────┘
//! ```

pub mod committee;
pub mod config;
pub mod engine;
pub mod error;
pub mod hash;
pub mod ledger;
pub mod mempool;
pub mod proposer;
pub mod sampler;
pub mod stake;
pub mod timeout;
pub mod transaction;
pub mod types;
pub mod votes;

// Re-exports for convenience
pub use committee::{byzantine_bound, quorum, weak_support, Committee, ValidatorDirectory};
pub use config::{BftConfig, ConfigError};
pub use engine::{ConsensusEngine, EngineOutput, Rule, ScheduledTimeout};
pub use error::{EngineError, LedgerError};
pub use ledger::Ledger;
pub use mempool::TransactionPool;
pub use proposer::{is_proposer, proposer_for_round};
pub use sampler::{CommitteeSelector, SimpleCommitteeSelector};
pub use stake::{ProofOfStakeState, StakeNode};
pub use timeout::TimeoutSchedule;
pub use transaction::Transaction;
pub use types::{
    Block, ConsensusMessage, ConsensusState, ConsensusStep, NodeId, Stage, TimeoutEvent, ValueId,
};
