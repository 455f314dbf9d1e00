//! Seed nodes: the discovery service of the simulated network.

use {
    crate::message::{Envelope, NodeDirectory, NodeKind, NodeRegistration, Outbox},
    log::*,
    tendersim_consensus_bft::NodeId,
};

pub struct SeedNode {
    id: NodeId,
    directory: NodeDirectory,
    /// Seed nodes a late seed announces itself to.
    root_seeds: Vec<NodeId>,
    started: bool,
}

impl SeedNode {
    /// A root seed node, known to everyone and serving from the start.
    pub fn new(id: NodeId) -> Self {
        let mut seed = Self::late(id, Vec::new());
        seed.started = true;
        seed
    }

    /// A seed node nobody knows about yet. It ignores traffic until
    /// [`SeedNode::start`] announces it to `root_seeds`.
    pub fn late(id: NodeId, root_seeds: Vec<NodeId>) -> Self {
        let mut directory = NodeDirectory::new();
        directory.register(&NodeRegistration {
            agent: id,
            kind: NodeKind::SeedNode,
        });
        Self {
            id,
            directory,
            root_seeds,
            started: false,
        }
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Register with the root seed nodes and ask them for their directory.
    pub fn start(&mut self) -> Outbox {
        if self.started {
            return Vec::new();
        }
        self.started = true;
        info!("{} joining through {} root seed nodes", self.id, self.root_seeds.len());
        let registration = Envelope::NodeRegistration(NodeRegistration {
            agent: self.id,
            kind: NodeKind::SeedNode,
        });
        self.root_seeds
            .iter()
            .map(|root| (*root, registration.clone()))
            .chain(
                self.root_seeds
                    .iter()
                    .map(|root| (*root, Envelope::GetNodeDirectory)),
            )
            .collect()
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn directory(&self) -> &NodeDirectory {
        &self.directory
    }

    /// Handle an envelope from `from` and return the replies.
    pub fn handle(&mut self, from: NodeId, envelope: Envelope) -> Outbox {
        if !self.started {
            debug!(
                "{} not started, dropping {} envelope from {from}",
                self.id,
                envelope.kind()
            );
            return Vec::new();
        }
        match envelope {
            Envelope::NodeRegistration(registration) => {
                if registration.agent != from {
                    warn!(
                        "{} dropping malformed registration of {} sent by {from}",
                        self.id, registration.agent
                    );
                } else if self.directory.register(&registration) {
                    debug!(
                        "{} registered {} as {:?}",
                        self.id, registration.agent, registration.kind
                    );
                }
                Vec::new()
            }
            Envelope::GetNodeDirectory => {
                vec![(from, Envelope::NodeDirectory(self.directory.clone()))]
            }
            Envelope::NodeDirectory(directory) => {
                self.directory.merge(&directory);
                Vec::new()
            }
            other => {
                warn!(
                    "{} received unexpected {} envelope from {from}",
                    self.id,
                    other.kind()
                );
                Vec::new()
            }
        }
    }
}
