//! Shared helpers for tendersim benchmarks.

use {
    std::{collections::VecDeque, sync::Arc},
    tendersim_consensus_bft::{
        BftConfig, Block, ConsensusEngine, ConsensusMessage, Ledger, NodeId, ProofOfStakeState,
        Transaction,
    },
};

/// Stake table of `n` addresses with equal weight.
pub fn make_stake_table(n: usize) -> ProofOfStakeState {
    let mut state = ProofOfStakeState::new();
    for i in 0..n as u32 {
        state.initiate_address_weight(&NodeId(i).address(), 1_000);
    }
    state
}

/// Stake table with descending weights so the first addresses dominate.
pub fn make_weighted_stake_table(n: usize) -> ProofOfStakeState {
    let mut state = ProofOfStakeState::new();
    for i in 0..n {
        let weight = (n.saturating_sub(i) as u64).saturating_mul(1_000);
        state.initiate_address_weight(&NodeId(i as u32).address(), weight);
    }
    state
}

/// Ledger holding genesis plus one block that locks equal stake for every
/// validator.
pub fn make_ledger(validators: &[NodeId]) -> Ledger {
    let mut ledger = Ledger::new();
    let previous = ledger.tip().sha256_base64_hash().to_string();
    let locks = validators
        .iter()
        .map(|id| Transaction::lock_stake(1, id.address(), 1_000, 50))
        .collect();
    ledger
        .add_block(Arc::new(Block::new(1, 1, previous, locks)))
        .expect("lock block extends genesis");
    ledger
}

/// `n` engines that know each other, with the whole set as committee.
/// They commit one height and halt.
pub fn make_engines(n: usize) -> Vec<ConsensusEngine> {
    let ids: Vec<NodeId> = (0..n as u32).map(NodeId).collect();
    let config = BftConfig {
        committee_size: n,
        max_height: 2,
        ..BftConfig::default()
    };
    let ledger = make_ledger(&ids);
    ids.iter()
        .map(|id| {
            let mut engine = ConsensusEngine::new(config.clone(), *id, ledger.clone());
            engine.learn_validators(ids.iter().copied());
            engine
        })
        .collect()
}

/// Start every engine and deliver all broadcasts in send order until the
/// network is quiet. Timers never fire. Returns the number of deliveries.
pub fn run_to_quiescence(engines: &mut [ConsensusEngine]) -> usize {
    let n = engines.len();
    let mut queue: VecDeque<(usize, ConsensusMessage)> = VecDeque::new();
    let broadcast = |queue: &mut VecDeque<_>, messages: Vec<ConsensusMessage>| {
        for message in messages {
            queue.extend((0..n).map(|to| (to, message.clone())));
        }
    };

    for engine in engines.iter_mut() {
        if let Ok(output) = engine.start(0) {
            broadcast(&mut queue, output.messages);
        }
    }

    let mut delivered = 0;
    while let Some((to, message)) = queue.pop_front() {
        delivered += 1;
        if let Ok(output) = engines[to].on_message(message, delivered as u64) {
            broadcast(&mut queue, output.messages);
        }
    }
    delivered
}
