//! Consensus engine benchmarks.
//!
//! Measures:
//! - A full height (propose, prevote, precommit, commit) across committees of
//!   4, 16 and 64 validators with in-order delivery
//! - Prevote quorum processing on a single engine

use {
    criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput},
    std::sync::Arc,
    tendersim_bench::helpers::{make_engines, run_to_quiescence},
    tendersim_consensus_bft::{proposer_for_round, Block, ConsensusMessage, NodeId},
};

fn bench_height_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("consensus/height_cycle");
    group.sample_size(20);

    for &n_validators in &[4usize, 16, 64] {
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(
            BenchmarkId::new("validators", n_validators),
            &n_validators,
            |b, &n| {
                b.iter_batched(
                    || make_engines(n),
                    |mut engines| run_to_quiescence(&mut engines),
                    criterion::BatchSize::SmallInput,
                );
            },
        );
    }
    group.finish();
}

fn bench_prevote_processing(c: &mut Criterion) {
    let mut group = c.benchmark_group("consensus/prevote_throughput");

    for &n_validators in &[4usize, 16, 64] {
        group.throughput(Throughput::Elements(n_validators as u64));
        group.bench_with_input(
            BenchmarkId::new("validators", n_validators),
            &n_validators,
            |b, &n| {
                b.iter_batched(
                    || {
                        let mut engines = make_engines(n);
                        let mut engine = engines.swap_remove(0);
                        let _ = engine.start(0);
                        let proposer = proposer_for_round(engine.committee(), 2, 0)
                            .unwrap_or(NodeId(0));
                        let previous = engine.ledger().tip().sha256_base64_hash().to_string();
                        let block = Arc::new(Block::new(2, 2, previous, Vec::new()));
                        let value = block.value_id().clone();
                        let _ = engine.on_message(
                            ConsensusMessage::Proposal {
                                height: 2,
                                round: 0,
                                block,
                                proposer,
                                valid_round: None,
                            },
                            1,
                        );
                        let prevotes: Vec<ConsensusMessage> = (0..n as u32)
                            .map(|voter| ConsensusMessage::Prevote {
                                height: 2,
                                round: 0,
                                value: Some(value.clone()),
                                voter: NodeId(voter),
                            })
                            .collect();
                        (engine, prevotes)
                    },
                    |(mut engine, prevotes)| {
                        for prevote in prevotes {
                            let _ = engine.on_message(prevote, 2);
                        }
                    },
                    criterion::BatchSize::SmallInput,
                );
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_height_cycle, bench_prevote_processing);
criterion_main!(benches);
