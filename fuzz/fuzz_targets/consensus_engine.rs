//! Fuzz the consensus engine with random message and timer sequences.
//!
//! Goals:
//! - Find panics or invalid state transitions.
//! - Verify that committed blocks always extend the local chain.
//! - Verify that lock and valid rounds never run ahead of the current round.
//! - Verify that heights and rounds only move forward.

#![no_main]

use {
    arbitrary::{Arbitrary, Unstructured},
    libfuzzer_sys::fuzz_target,
    std::sync::Arc,
    tendersim_consensus_bft::{
        BftConfig, Block, ConsensusEngine, ConsensusMessage, ConsensusStep, Ledger, NodeId,
        Stage, TimeoutEvent, Transaction, ValueId,
    },
};

/// A fuzzable input the engine can receive.
#[derive(Debug)]
enum FuzzAction {
    /// Deliver a proposal built on the engine's tip.
    Proposal {
        proposer_idx: usize,
        /// Added to the engine's height; 1 exercises the future buffer.
        height_offset: u64,
        round_offset: u32,
        valid_round: Option<u32>,
        timestamp: u64,
    },
    Prevote {
        voter_idx: usize,
        height_offset: u64,
        round_offset: u32,
        /// If true, vote for the last proposed value; if false, nil vote.
        vote_for_proposal: bool,
    },
    Precommit {
        voter_idx: usize,
        height_offset: u64,
        round_offset: u32,
        vote_for_proposal: bool,
    },
    /// Fire a timer, possibly stale.
    Timeout { step_idx: u8, round_offset: u32 },
    /// Submit a client transfer.
    Transaction { sender_idx: usize, amount: u64 },
}

impl<'a> Arbitrary<'a> for FuzzAction {
    fn arbitrary(u: &mut Unstructured<'a>) -> arbitrary::Result<Self> {
        let variant = u.int_in_range(0..=4)?;
        match variant {
            0 => Ok(FuzzAction::Proposal {
                proposer_idx: u.int_in_range(0..=7)?,
                height_offset: u.int_in_range(0..=1)?,
                round_offset: u.int_in_range(0..=2)?,
                valid_round: if u.ratio(1, 3)? {
                    Some(u.int_in_range(0..=10)?)
                } else {
                    None
                },
                timestamp: u.int_in_range(1..=1_000)?,
            }),
            1 => Ok(FuzzAction::Prevote {
                voter_idx: u.int_in_range(0..=7)?,
                height_offset: u.int_in_range(0..=1)?,
                round_offset: u.int_in_range(0..=2)?,
                vote_for_proposal: u.ratio(3, 4)?,
            }),
            2 => Ok(FuzzAction::Precommit {
                voter_idx: u.int_in_range(0..=7)?,
                height_offset: u.int_in_range(0..=1)?,
                round_offset: u.int_in_range(0..=2)?,
                vote_for_proposal: u.ratio(3, 4)?,
            }),
            3 => Ok(FuzzAction::Timeout {
                step_idx: u.int_in_range(0..=2)?,
                round_offset: u.int_in_range(0..=1)?,
            }),
            4 => Ok(FuzzAction::Transaction {
                sender_idx: u.int_in_range(0..=7)?,
                amount: u.int_in_range(0..=1_000)?,
            }),
            _ => unreachable!(),
        }
    }
}

fuzz_target!(|data: &[u8]| {
    let mut u = Unstructured::new(data);

    // Deterministic validator set of 4-8 nodes.
    let num_validators: usize = match u.int_in_range(4..=8) {
        Ok(n) => n,
        Err(_) => return,
    };
    let validators: Vec<NodeId> = (0..num_validators as u32).map(NodeId).collect();

    let mut ledger = Ledger::new();
    let previous = ledger.tip().sha256_base64_hash().to_string();
    let locks = validators
        .iter()
        .map(|id| {
            let stake = u.int_in_range(1..=1000).unwrap_or(100);
            Transaction::lock_stake(1, id.address(), stake, 50)
        })
        .collect();
    if ledger
        .add_block(Arc::new(Block::new(1, 1, previous, locks)))
        .is_err()
    {
        return;
    }

    let config = BftConfig {
        committee_size: num_validators,
        max_height: 20,
        ..BftConfig::default()
    };

    // We fuzz as validator 0.
    let mut engine = ConsensusEngine::new(config, validators[0], ledger);
    engine.learn_validators(validators.iter().copied());
    if engine.start(0).is_err() {
        return;
    }

    // Last proposed value per height, for votes to reference.
    let mut proposed: std::collections::HashMap<u64, ValueId> = std::collections::HashMap::new();
    let mut position = (engine.height(), engine.round());
    let mut now = 0u64;

    let num_actions: usize = u.int_in_range(1..=300).unwrap_or(50);

    for _ in 0..num_actions {
        let action: FuzzAction = match u.arbitrary() {
            Ok(a) => a,
            Err(_) => break,
        };
        now += 1;
        let height_before = engine.ledger().current_height();

        let result = match action {
            FuzzAction::Proposal {
                proposer_idx,
                height_offset,
                round_offset,
                valid_round,
                timestamp,
            } => {
                let height = engine.height() + height_offset;
                let block = Arc::new(Block::new(
                    height,
                    timestamp,
                    engine.ledger().tip().sha256_base64_hash(),
                    Vec::new(),
                ));
                proposed.insert(height, block.value_id().clone());
                engine.on_message(
                    ConsensusMessage::Proposal {
                        height,
                        round: engine.round() + round_offset,
                        block,
                        proposer: validators[proposer_idx % num_validators],
                        valid_round,
                    },
                    now,
                )
            }

            FuzzAction::Prevote {
                voter_idx,
                height_offset,
                round_offset,
                vote_for_proposal,
            } => {
                let height = engine.height() + height_offset;
                let value = vote_for_proposal
                    .then(|| proposed.get(&height).cloned())
                    .flatten();
                engine.on_message(
                    ConsensusMessage::Prevote {
                        height,
                        round: engine.round() + round_offset,
                        value,
                        voter: validators[voter_idx % num_validators],
                    },
                    now,
                )
            }

            FuzzAction::Precommit {
                voter_idx,
                height_offset,
                round_offset,
                vote_for_proposal,
            } => {
                let height = engine.height() + height_offset;
                let value = vote_for_proposal
                    .then(|| proposed.get(&height).cloned())
                    .flatten();
                engine.on_message(
                    ConsensusMessage::Precommit {
                        height,
                        round: engine.round() + round_offset,
                        value,
                        voter: validators[voter_idx % num_validators],
                    },
                    now,
                )
            }

            FuzzAction::Timeout {
                step_idx,
                round_offset,
            } => {
                let step = match step_idx % 3 {
                    0 => ConsensusStep::Propose,
                    1 => ConsensusStep::Prevote,
                    _ => ConsensusStep::Precommit,
                };
                let round = engine.round().saturating_sub(round_offset);
                engine.on_timeout(
                    TimeoutEvent {
                        step,
                        stage: Stage::new(engine.height(), round),
                    },
                    now,
                )
            }

            FuzzAction::Transaction { sender_idx, amount } => {
                engine.on_transaction(Transaction::money_transfer(
                    now,
                    validators[sender_idx % num_validators].address(),
                    validators[0].address(),
                    amount,
                    1,
                ))
            }
        };

        // ── Invariant checks ──

        // 1. Commits extend the chain one height at a time.
        if let Ok(output) = &result {
            for (offset, block) in output.committed.iter().enumerate() {
                assert_eq!(
                    block.height(),
                    height_before + 1 + offset as u64,
                    "committed block does not extend the chain"
                );
            }
        }
        assert!(engine.ledger().verify_chain().is_ok(), "ledger chain broken");

        // 2. Lock and valid rounds never exceed the current round.
        let state = engine.state();
        assert!(state.locked_round.is_none_or(|round| round <= state.round));
        assert!(state.valid_round.is_none_or(|round| round <= state.round));
        assert_eq!(state.locked_round.is_some(), state.locked_value.is_some());

        // 3. Progress is monotone.
        let current = (engine.height(), engine.round());
        assert!(current.0 >= position.0, "height went backwards");
        if current.0 == position.0 {
            assert!(current.1 >= position.1, "round went backwards");
        }
        position = current;
    }
});
