//! Envelopes exchanged between simulated actors.

use {
    std::{collections::BTreeSet, fmt},
    tendersim_consensus_bft::{ConsensusMessage, NodeId, Transaction},
};

/// Role an actor registers under with a seed node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKind {
    SeedNode,
    Validator,
    FullNode,
}

/// Announcement of an actor to a seed node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRegistration {
    pub agent: NodeId,
    pub kind: NodeKind,
}

/// Directory of known actors, as kept by seed nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeDirectory {
    pub seed_nodes: BTreeSet<NodeId>,
    pub validators: BTreeSet<NodeId>,
    pub full_nodes: BTreeSet<NodeId>,
}

impl NodeDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a registered agent. Returns whether it was new.
    pub fn register(&mut self, registration: &NodeRegistration) -> bool {
        let set = match registration.kind {
            NodeKind::SeedNode => &mut self.seed_nodes,
            NodeKind::Validator => &mut self.validators,
            NodeKind::FullNode => &mut self.full_nodes,
        };
        set.insert(registration.agent)
    }

    /// Set union with `other`.
    pub fn merge(&mut self, other: &NodeDirectory) {
        self.seed_nodes.extend(other.seed_nodes.iter().copied());
        self.validators.extend(other.validators.iter().copied());
        self.full_nodes.extend(other.full_nodes.iter().copied());
    }

    pub fn len(&self) -> usize {
        self.seed_nodes.len() + self.validators.len() + self.full_nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Everything that travels over the simulated network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope {
    Consensus(ConsensusMessage),
    TransactionGossip(Transaction),
    NodeRegistration(NodeRegistration),
    GetNodeDirectory,
    NodeDirectory(NodeDirectory),
}

impl Envelope {
    pub fn kind(&self) -> &'static str {
        match self {
            Envelope::Consensus(_) => "consensus",
            Envelope::TransactionGossip(_) => "transaction-gossip",
            Envelope::NodeRegistration(_) => "node-registration",
            Envelope::GetNodeDirectory => "get-node-directory",
            Envelope::NodeDirectory(_) => "node-directory",
        }
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Envelope::Consensus(message) => write!(f, "{message}"),
            Envelope::TransactionGossip(tx) => write!(f, "gossip({tx})"),
            Envelope::NodeRegistration(registration) => write!(
                f,
                "register({} as {:?})",
                registration.agent, registration.kind
            ),
            Envelope::GetNodeDirectory => write!(f, "get-node-directory"),
            Envelope::NodeDirectory(directory) => {
                write!(f, "node-directory({} entries)", directory.len())
            }
        }
    }
}

/// Envelopes an actor wants sent, with their recipients.
pub type Outbox = Vec<(NodeId, Envelope)>;
