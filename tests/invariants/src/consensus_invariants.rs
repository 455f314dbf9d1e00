//! Property-based tests for consensus invariants.
//!
//! Properties tested:
//! 1. Agreement: validators never hold different blocks at one height, for
//!    any delivery order, loss pattern and timer interleaving.
//! 2. Heights grow by exactly one per commit and rounds only move forward
//!    within a height.
//! 3. Liveness without faults: a fully delivered committee reaches the
//!    maximum height.
//! 4. Duplicate votes are counted once.

#[cfg(test)]
mod tests {
    use {
        proptest::prelude::*,
        rand::{Rng, SeedableRng},
        rand_chacha::ChaCha8Rng,
        std::{collections::HashSet, sync::Arc},
        tendersim_consensus_bft::{
            votes::VoteBook, BftConfig, Block, ConsensusEngine, ConsensusMessage, Ledger, NodeId,
            Stage, TimeoutEvent, Transaction, ValueId,
        },
    };

    // ── Helpers ──

    fn make_ledger(stakers: &[NodeId], stakes: &[u64]) -> Ledger {
        let mut ledger = Ledger::new();
        let previous = ledger.tip().sha256_base64_hash().to_string();
        let locks = stakers
            .iter()
            .zip(stakes)
            .map(|(id, stake)| Transaction::lock_stake(1, id.address(), *stake, 50))
            .collect();
        ledger
            .add_block(Arc::new(Block::new(1, 1, previous, locks)))
            .unwrap();
        ledger
    }

    fn make_engines(
        stakes: &[u64],
        committee_size: usize,
        max_height: u64,
    ) -> Vec<ConsensusEngine> {
        let ids: Vec<NodeId> = (0..stakes.len() as u32).map(NodeId).collect();
        let config = BftConfig {
            committee_size,
            max_height,
            ..BftConfig::default()
        };
        ids.iter()
            .map(|id| {
                let mut engine =
                    ConsensusEngine::new(config.clone(), *id, make_ledger(&ids, stakes));
                engine.learn_validators(ids.iter().copied());
                engine
            })
            .collect()
    }

    /// In-memory network with random delivery order, random loss and
    /// randomly interleaved timers.
    struct Harness {
        engines: Vec<ConsensusEngine>,
        messages: Vec<(usize, ConsensusMessage)>,
        timers: Vec<(usize, TimeoutEvent)>,
        rng: ChaCha8Rng,
        loss: f64,
        /// Deliver messages in send order instead of at random.
        fifo: bool,
        now: u64,
        /// Last (height, round) seen per engine.
        positions: Vec<(u64, u32)>,
    }

    impl Harness {
        fn new(engines: Vec<ConsensusEngine>, seed: u64, loss: f64) -> Self {
            let positions = engines.iter().map(|e| (e.height(), e.round())).collect();
            Self {
                engines,
                messages: Vec::new(),
                timers: Vec::new(),
                rng: ChaCha8Rng::seed_from_u64(seed),
                loss,
                fifo: false,
                now: 0,
                positions,
            }
        }

        fn start(&mut self) {
            for index in 0..self.engines.len() {
                let output = self.engines[index].start(0).unwrap();
                self.absorb(index, output);
            }
        }

        fn absorb(&mut self, from: usize, output: tendersim_consensus_bft::EngineOutput) {
            for message in output.messages {
                for to in 0..self.engines.len() {
                    if self.loss > 0.0 && self.rng.random::<f64>() < self.loss {
                        continue;
                    }
                    self.messages.push((to, message.clone()));
                }
            }
            self.timers
                .extend(output.timeouts.into_iter().map(|timeout| (from, timeout.event)));
        }

        /// Process one random event. Returns false once nothing is left.
        fn step(&mut self, timer_bias: f64) -> bool {
            self.now += 1;
            let fire_timer = !self.timers.is_empty()
                && (self.messages.is_empty() || self.rng.random::<f64>() < timer_bias);
            let (index, output) = if fire_timer {
                let pick = self.rng.random_range(0..self.timers.len());
                let (index, event) = self.timers.swap_remove(pick);
                (index, self.engines[index].on_timeout(event, self.now).unwrap())
            } else if !self.messages.is_empty() {
                let (index, message) = if self.fifo {
                    self.messages.remove(0)
                } else {
                    let pick = self.rng.random_range(0..self.messages.len());
                    self.messages.swap_remove(pick)
                };
                (index, self.engines[index].on_message(message, self.now).unwrap())
            } else {
                return false;
            };
            self.absorb(index, output);
            self.check_progress(index);
            true
        }

        fn check_progress(&mut self, index: usize) {
            let engine = &self.engines[index];
            let (height, round) = (engine.height(), engine.round());
            let (last_height, last_round) = self.positions[index];
            assert!(height >= last_height, "height went backwards");
            if height == last_height {
                assert!(round >= last_round, "round went backwards");
            }
            self.positions[index] = (height, round);
        }

        fn assert_agreement(&self) {
            let max = self
                .engines
                .iter()
                .map(|e| e.ledger().current_height())
                .max()
                .unwrap_or(0);
            for height in 0..=max {
                let hashes: HashSet<&str> = self
                    .engines
                    .iter()
                    .filter_map(|e| e.ledger().get_block(height))
                    .map(|block| block.sha256_base64_hash())
                    .collect();
                assert!(hashes.len() <= 1, "disagreement at height {height}");
            }
            for engine in &self.engines {
                assert!(engine.ledger().verify_chain().is_ok());
                let heights: Vec<u64> = engine.ledger().iter().map(|b| b.height()).collect();
                let expected: Vec<u64> = (0..heights.len() as u64).collect();
                assert_eq!(heights, expected);
            }
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 1 & 2. Agreement and monotonic progress under adversarial scheduling
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn agreement_under_random_scheduling(
            stakes in prop::collection::vec(1..=100u64, 4..=7),
            committee_size in 4..=7usize,
            seed in any::<u64>(),
            loss in prop_oneof![Just(0.0), 0.0..0.2f64],
            timer_bias in 0.0..0.3f64,
        ) {
            let engines = make_engines(&stakes, committee_size, 8);
            let mut harness = Harness::new(engines, seed, loss);
            harness.start();
            for _ in 0..10_000 {
                if !harness.step(timer_bias) {
                    break;
                }
            }
            harness.assert_agreement();
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 3. Liveness without faults
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(4))]

        /// Every message delivered in send order, timers never fire: the
        /// whole committee commits every height in round 0.
        #[test]
        fn all_honest_reach_max_height(validators in 4..=7usize) {
            let stakes = vec![10; validators];
            let engines = make_engines(&stakes, validators, 6);
            let mut harness = Harness::new(engines, 0, 0.0);
            harness.fifo = true;
            harness.start();
            harness.timers.clear();
            while !harness.messages.is_empty() {
                harness.step(0.0);
                harness.timers.clear();
            }
            harness.assert_agreement();
            for engine in &harness.engines {
                prop_assert!(engine.is_halted());
                prop_assert_eq!(engine.ledger().current_height(), 6);
                prop_assert!(engine.height_rounds().values().all(|round| *round == 0));
            }
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 4. Vote deduplication
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn duplicate_votes_counted_once(
            votes in prop::collection::vec((0..6u32, prop::option::of(0..3u8)), 0..64),
        ) {
            let stage = Stage::new(2, 0);
            let mut book = VoteBook::new();
            let mut voters = HashSet::new();
            for (voter, value) in &votes {
                let value = value.map(|v| ValueId(format!("value-{v}")));
                let recorded = book.record_prevote(stage, NodeId(*voter), value.clone());
                prop_assert_eq!(recorded, voters.insert(*voter));
                book.record_precommit(stage, NodeId(*voter), value);
            }
            prop_assert_eq!(book.total_prevotes(stage), voters.len());
            prop_assert_eq!(book.total_precommits(stage), voters.len());
        }
    }
}
