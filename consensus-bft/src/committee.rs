//! Committee membership and quorum thresholds.
//!
//! The sampler yields committee *addresses*. They are resolved against the
//! directory of known validators into an ordered member list, which is what
//! proposer selection and vote counting work from.

use {
    crate::types::NodeId,
    std::collections::{BTreeMap, BTreeSet},
};

/// Maximum number of faulty members a committee of `size` tolerates.
///
/// `f = size / 3`, minus one when `size` is a multiple of three, so that
/// `3f < size` always holds.
pub fn byzantine_bound(size: usize) -> usize {
    let f = size / 3;
    if f > 0 && f * 3 == size {
        f - 1
    } else {
        f
    }
}

/// Votes needed for a quorum: `2f + 1`.
pub fn quorum(size: usize) -> usize {
    2 * byzantine_bound(size) + 1
}

/// Messages needed to prove at least one honest participant: `f + 1`.
pub fn weak_support(size: usize) -> usize {
    byzantine_bound(size) + 1
}

/// Known validators, keyed by committee address.
///
/// Grows only through [`ValidatorDirectory::merge`], the set union applied
/// when a directory announcement is received.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidatorDirectory {
    validators: BTreeMap<String, NodeId>,
}

impl ValidatorDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Union `validators` into the directory. Returns how many were new.
    pub fn merge<I: IntoIterator<Item = NodeId>>(&mut self, validators: I) -> usize {
        validators
            .into_iter()
            .filter(|id| self.validators.insert(id.address(), *id).is_none())
            .count()
    }

    pub fn resolve(&self, address: &str) -> Option<NodeId> {
        self.validators.get(address).copied()
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.validators.contains_key(&id.address())
    }

    pub fn ids(&self) -> BTreeSet<NodeId> {
        self.validators.values().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }
}

/// The committee of one height.
///
/// Members are kept sorted by identity, so every validator derives the same
/// member list from the same address set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Committee {
    members: Vec<NodeId>,
}

impl Committee {
    pub fn new(members: impl IntoIterator<Item = NodeId>) -> Self {
        let members: BTreeSet<NodeId> = members.into_iter().collect();
        Self {
            members: members.into_iter().collect(),
        }
    }

    /// Resolve sampled addresses into members. Addresses with no known
    /// validator behind them are left out.
    pub fn resolve<'a, I>(addresses: I, directory: &ValidatorDirectory) -> Self
    where
        I: IntoIterator<Item = &'a String>,
    {
        Self::new(
            addresses
                .into_iter()
                .filter_map(|address| directory.resolve(address)),
        )
    }

    pub fn members(&self) -> &[NodeId] {
        &self.members
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.members.binary_search(id).is_ok()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn byzantine_bound(&self) -> usize {
        byzantine_bound(self.len())
    }

    pub fn quorum(&self) -> usize {
        quorum(self.len())
    }

    pub fn weak_support(&self) -> usize {
        weak_support(self.len())
    }
}
