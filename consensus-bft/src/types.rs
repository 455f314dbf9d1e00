//! Core types for the consensus protocol.
//!
//! Defines actor identities, blocks, the (height, round) stage, message
//! types (Proposal, Prevote, Precommit) and the per-validator round state.

use {
    crate::{
        hash::{sha256_base64, two_level_hash},
        transaction::Transaction,
    },
    std::{fmt, sync::Arc},
};

// ---------------------------------------------------------------------------
// Identities
// ---------------------------------------------------------------------------

/// Stable identifier of a simulated actor (validator, client or seed node).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Committee address of this node, derived by hashing its identity bytes.
    pub fn address(&self) -> String {
        let mut bytes = b"node-".to_vec();
        bytes.extend_from_slice(&self.0.to_be_bytes());
        sha256_base64(&bytes)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node-{}", self.0)
    }
}

/// Identifier of a proposed value: the block's content hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(pub String);

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short prefix keeps log lines readable.
        let short: String = self.0.chars().take(8).collect();
        write!(f, "{short}")
    }
}

// ---------------------------------------------------------------------------
// Blocks
// ---------------------------------------------------------------------------

/// Previous-hash sentinel carried by the genesis block.
pub const GENESIS_PREVIOUS_HASH: &str = "GENESIS";

/// An immutable block of transactions.
///
/// The content hash is computed once at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    height: u64,
    timestamp: u64,
    previous: String,
    transactions: Vec<Transaction>,
    hash: ValueId,
}

impl Block {
    pub fn new(
        height: u64,
        timestamp: u64,
        previous: impl Into<String>,
        transactions: Vec<Transaction>,
    ) -> Self {
        let previous = previous.into();
        let hash = ValueId(Self::compute_hash(
            height,
            timestamp,
            &previous,
            &transactions,
        ));
        Self {
            height,
            timestamp,
            previous,
            transactions,
            hash,
        }
    }

    /// The fixed height-0 sentinel every ledger starts from.
    pub fn genesis() -> Self {
        Self::new(0, 0, GENESIS_PREVIOUS_HASH, Vec::new())
    }

    /// Hash over height, timestamp, previous hash and the sorted
    /// transaction hashes. Transaction order inside the block does not
    /// change the identity.
    fn compute_hash(
        height: u64,
        timestamp: u64,
        previous: &str,
        transactions: &[Transaction],
    ) -> String {
        let mut tx_hashes: Vec<String> = transactions
            .iter()
            .map(Transaction::sha256_base64_hash)
            .collect();
        tx_hashes.sort_unstable();
        let tx_digest = tx_hashes.concat();
        two_level_hash([
            &height.to_be_bytes()[..],
            &timestamp.to_be_bytes()[..],
            previous.as_bytes(),
            tx_digest.as_bytes(),
        ])
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn previous(&self) -> &str {
        &self.previous
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn sha256_base64_hash(&self) -> &str {
        &self.hash.0
    }

    pub fn value_id(&self) -> &ValueId {
        &self.hash
    }
}

// ---------------------------------------------------------------------------
// Stages and steps
// ---------------------------------------------------------------------------

/// A (height, round) pair, the unit of quorum bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Stage {
    pub height: u64,
    pub round: u32,
}

impl Stage {
    pub fn new(height: u64, round: u32) -> Self {
        Self { height, round }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "h={} r={}", self.height, self.round)
    }
}

/// Phase within a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConsensusStep {
    Propose,
    Prevote,
    Precommit,
}

impl fmt::Display for ConsensusStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsensusStep::Propose => write!(f, "PROPOSE"),
            ConsensusStep::Prevote => write!(f, "PREVOTE"),
            ConsensusStep::Precommit => write!(f, "PRECOMMIT"),
        }
    }
}

// ---------------------------------------------------------------------------
// Consensus messages
// ---------------------------------------------------------------------------

/// Messages exchanged between validators during consensus rounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsensusMessage {
    /// A block proposal broadcast by the round's designated proposer.
    Proposal {
        height: u64,
        round: u32,
        block: Arc<Block>,
        proposer: NodeId,
        /// Round in which the proposer saw this value gather a prevote
        /// quorum, if any.
        valid_round: Option<u32>,
    },

    /// `value == None` is a nil prevote.
    Prevote {
        height: u64,
        round: u32,
        value: Option<ValueId>,
        voter: NodeId,
    },

    /// `value == None` is a nil precommit.
    Precommit {
        height: u64,
        round: u32,
        value: Option<ValueId>,
        voter: NodeId,
    },
}

impl ConsensusMessage {
    /// Returns the height this message belongs to.
    pub fn height(&self) -> u64 {
        match self {
            ConsensusMessage::Proposal { height, .. }
            | ConsensusMessage::Prevote { height, .. }
            | ConsensusMessage::Precommit { height, .. } => *height,
        }
    }

    /// Returns the round this message belongs to.
    pub fn round(&self) -> u32 {
        match self {
            ConsensusMessage::Proposal { round, .. }
            | ConsensusMessage::Prevote { round, .. }
            | ConsensusMessage::Precommit { round, .. } => *round,
        }
    }

    pub fn stage(&self) -> Stage {
        Stage::new(self.height(), self.round())
    }

    /// Returns the identity of the sender.
    pub fn sender(&self) -> NodeId {
        match self {
            ConsensusMessage::Proposal { proposer, .. } => *proposer,
            ConsensusMessage::Prevote { voter, .. }
            | ConsensusMessage::Precommit { voter, .. } => *voter,
        }
    }
}

impl fmt::Display for ConsensusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = |value: &Option<ValueId>| match value {
            Some(id) => id.to_string(),
            None => "nil".to_string(),
        };
        match self {
            ConsensusMessage::Proposal {
                height,
                round,
                block,
                proposer,
                valid_round,
            } => write!(
                f,
                "Proposal(h={height} r={round} v={} vr={valid_round:?} from {proposer})",
                block.value_id()
            ),
            ConsensusMessage::Prevote {
                height,
                round,
                value: v,
                voter,
            } => write!(f, "Prevote(h={height} r={round} v={} from {voter})", value(v)),
            ConsensusMessage::Precommit {
                height,
                round,
                value: v,
                voter,
            } => write!(
                f,
                "Precommit(h={height} r={round} v={} from {voter})",
                value(v)
            ),
        }
    }
}

/// A one-shot timer request, tagged with the stage it was armed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeoutEvent {
    pub step: ConsensusStep,
    pub stage: Stage,
}

// ---------------------------------------------------------------------------
// Round state
// ---------------------------------------------------------------------------

/// The mutable round state of a single validator.
///
/// Height is not stored here; it is derived from the ledger.
#[derive(Debug, Clone)]
pub struct ConsensusState {
    pub round: u32,
    pub step: ConsensusStep,
    /// The value this validator precommitted to, if any.
    pub locked_value: Option<Arc<Block>>,
    pub locked_round: Option<u32>,
    /// The most recent value seen with a prevote quorum.
    pub valid_value: Option<Arc<Block>>,
    pub valid_round: Option<u32>,
}

impl Default for ConsensusState {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsensusState {
    pub fn new() -> Self {
        Self {
            round: 0,
            step: ConsensusStep::Propose,
            locked_value: None,
            locked_round: None,
            valid_value: None,
            valid_round: None,
        }
    }

    /// Move to a later round of the same height. Lock and valid state are
    /// preserved across rounds.
    pub fn advance_round(&mut self, new_round: u32) {
        self.round = new_round;
        self.step = ConsensusStep::Propose;
    }

    pub fn is_locked_on(&self, value: &ValueId) -> bool {
        self.locked_value
            .as_ref()
            .is_some_and(|locked| locked.value_id() == value)
    }
}
