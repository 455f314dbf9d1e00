//! Leader / proposer selection.
//!
//! Every committee member must agree on the proposer of any
//! (height, round), so the choice depends only on the committee's ordered
//! member list.

use crate::{committee::Committee, types::NodeId};

/// Index of the proposer in a committee of `size` members:
/// `((size + height) mod size + round) mod size`.
///
/// Returns `None` for an empty committee.
pub fn proposer_index(size: usize, height: u64, round: u32) -> Option<usize> {
    let size = u64::try_from(size).ok().filter(|size| *size > 0)?;
    let index = (height % size + u64::from(round) % size) % size;
    usize::try_from(index).ok()
}

/// The proposer of `(height, round)` for `committee`.
pub fn proposer_for_round(committee: &Committee, height: u64, round: u32) -> Option<NodeId> {
    proposer_index(committee.len(), height, round)
        .and_then(|index| committee.members().get(index).copied())
}

/// Check if `identity` is the proposer for `(height, round)`.
pub fn is_proposer(committee: &Committee, identity: &NodeId, height: u64, round: u32) -> bool {
    proposer_for_round(committee, height, round).is_some_and(|proposer| proposer == *identity)
}
