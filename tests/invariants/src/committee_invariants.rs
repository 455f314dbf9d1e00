//! Property-based tests for committee sampling and quorum thresholds.
//!
//! Properties tested:
//! 1. `3f < size <= 3f + 3` for every committee size.
//! 2. The sampler is deterministic for a fixed stake table and seed.
//! 3. The sampler returns distinct staked addresses, `min(size, len)` of them.
//! 4. A size at or above the table length returns the whole table.
//! 5. Proposer selection stays inside the committee.

#[cfg(test)]
mod tests {
    use {
        proptest::prelude::*,
        rand::SeedableRng,
        rand_chacha::ChaCha8Rng,
        std::collections::BTreeSet,
        tendersim_consensus_bft::{
            byzantine_bound, proposer_for_round, quorum, weak_support, Committee,
            CommitteeSelector, NodeId, ProofOfStakeState, SimpleCommitteeSelector,
        },
    };

    fn make_state(weights: &[u64]) -> ProofOfStakeState {
        let mut state = ProofOfStakeState::new();
        for (index, weight) in weights.iter().enumerate() {
            state.initiate_address_weight(&NodeId(index as u32).address(), *weight);
        }
        state
    }

    fn select(state: &ProofOfStakeState, size: usize, seed: u64) -> BTreeSet<String> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        SimpleCommitteeSelector.select_committee(state, size, &mut rng)
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 1. Byzantine bound
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(1000))]

        #[test]
        fn byzantine_bound_is_tight(size in 1..=10_000usize) {
            let f = byzantine_bound(size);
            prop_assert!(3 * f < size);
            prop_assert!(size <= 3 * f + 3);
            prop_assert_eq!(quorum(size), 2 * f + 1);
            prop_assert_eq!(weak_support(size), f + 1);
            prop_assert!(quorum(size) <= size);
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 2-4. Sampler
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(300))]

        #[test]
        fn sampler_is_deterministic(
            weights in prop::collection::vec(1..=1_000u64, 1..=30),
            size in 1..=30usize,
            seed in any::<u64>(),
        ) {
            let state = make_state(&weights);
            prop_assert_eq!(select(&state, size, seed), select(&state, size, seed));
        }

        #[test]
        fn sampler_returns_distinct_staked_addresses(
            weights in prop::collection::vec(1..=1_000u64, 1..=30),
            size in 1..=30usize,
            seed in any::<u64>(),
        ) {
            let state = make_state(&weights);
            let committee = select(&state, size, seed);
            prop_assert_eq!(committee.len(), size.min(weights.len()));
            for address in &committee {
                prop_assert!(state.weight_of(address) > 0);
            }
        }

        #[test]
        fn sampler_returns_everyone_when_size_covers_table(
            weights in prop::collection::vec(1..=1_000u64, 1..=20),
            extra in 0..=5usize,
            seed in any::<u64>(),
        ) {
            let state = make_state(&weights);
            let everyone: BTreeSet<String> =
                state.iter().map(|(address, _)| address.to_string()).collect();
            prop_assert_eq!(select(&state, weights.len() + extra, seed), everyone);
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 5. Proposer selection
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        #[test]
        fn proposer_is_a_member_and_rotates(
            members in prop::collection::btree_set(0..100u32, 1..=10),
            height in 0..=10_000u64,
            round in 0..=20u32,
        ) {
            let committee = Committee::new(members.iter().copied().map(NodeId));
            let proposer = proposer_for_round(&committee, height, round);
            prop_assert!(proposer.is_some_and(|id| committee.contains(&id)));

            // Every member proposes once over `len` consecutive rounds.
            let rotation: BTreeSet<NodeId> = (0..committee.len() as u32)
                .filter_map(|r| proposer_for_round(&committee, height, r))
                .collect();
            prop_assert_eq!(rotation.len(), committee.len());
        }
    }
}
