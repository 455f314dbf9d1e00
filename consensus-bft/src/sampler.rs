//! Stake-weighted committee sampling.
//!
//! Draws a fixed-size committee from the stake table without replacement.
//! The random source is injected, so a committee is reproducible from the
//! stake snapshot and the generator's seed alone.

use {
    crate::stake::ProofOfStakeState,
    rand::Rng,
    std::collections::BTreeSet,
};

/// Chooses the committee for a height.
pub trait CommitteeSelector {
    /// Return `size` distinct addresses, or every address if the table holds
    /// no more than `size` of them.
    fn select_committee<R: Rng + ?Sized>(
        &self,
        state: &ProofOfStakeState,
        size: usize,
        rng: &mut R,
    ) -> BTreeSet<String>;
}

/// Weighted sampling without replacement over an integer interval partition.
///
/// # Algorithm
///
/// 1. Lay the staked addresses out in address order. Each one owns the
///    interval `[min, min + weight - 1]`, starting at 1, so the intervals
///    span `[1, total_weight]`.
/// 2. For every seat, draw `r` uniformly in `[1, total_weight - removed]`,
///    where `removed` is the weight of the intervals already chosen.
/// 3. Walk the unchosen intervals in layout order. Each interval's bounds
///    are shifted down by the weight of the chosen intervals before it. The
///    interval whose shifted range contains `r` takes the seat and is
///    removed.
///
/// Bounds are kept in `u128`, so any table of `u64` weights lays out without
/// overflow.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimpleCommitteeSelector;

#[derive(Debug)]
struct Interval<'a> {
    address: &'a str,
    min: u128,
    weight: u128,
}

impl SimpleCommitteeSelector {
    fn layout(state: &ProofOfStakeState) -> Vec<Interval<'_>> {
        let mut next_min = 1u128;
        state
            .iter()
            .map(|(address, weight)| {
                let interval = Interval {
                    address,
                    min: next_min,
                    weight: u128::from(weight),
                };
                next_min += interval.weight;
                interval
            })
            .collect()
    }

    fn locate(intervals: &[Interval<'_>], removed: &[bool], draw: u128) -> Option<usize> {
        let mut offset = 0u128;
        for (index, interval) in intervals.iter().enumerate() {
            if removed[index] {
                offset += interval.weight;
                continue;
            }
            let upper = interval.min - offset + interval.weight - 1;
            if draw <= upper {
                return Some(index);
            }
        }
        None
    }
}

impl CommitteeSelector for SimpleCommitteeSelector {
    fn select_committee<R: Rng + ?Sized>(
        &self,
        state: &ProofOfStakeState,
        size: usize,
        rng: &mut R,
    ) -> BTreeSet<String> {
        if size >= state.len() {
            return state
                .iter()
                .map(|(address, _)| address.to_string())
                .collect();
        }

        let intervals = Self::layout(state);
        let total: u128 = intervals.iter().map(|interval| interval.weight).sum();
        let mut removed = vec![false; intervals.len()];
        let mut removed_weight = 0u128;
        let mut committee = BTreeSet::new();

        while committee.len() < size {
            let remaining = total - removed_weight;
            if remaining == 0 {
                break;
            }
            let draw = rng.random_range(1..=remaining);
            let Some(index) = Self::locate(&intervals, &removed, draw) else {
                break;
            };
            removed[index] = true;
            removed_weight += intervals[index].weight;
            committee.insert(intervals[index].address.to_string());
        }

        committee
    }
}
