//! Committee sampling benchmarks.
//!
//! Measures stake-weighted sampling over tables of 100 to 10,000 addresses
//! with equal and skewed weights.

use {
    criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput},
    rand::SeedableRng,
    rand_chacha::ChaCha8Rng,
    tendersim_bench::helpers::{make_stake_table, make_weighted_stake_table},
    tendersim_consensus_bft::{CommitteeSelector, SimpleCommitteeSelector},
};

const COMMITTEE_SIZE: usize = 100;

fn bench_equal_stake_sampling(c: &mut Criterion) {
    let mut group = c.benchmark_group("committee/equal_stake");

    for &n_addresses in &[200usize, 1_000, 10_000] {
        group.throughput(Throughput::Elements(COMMITTEE_SIZE as u64));
        group.bench_with_input(
            BenchmarkId::new("addresses", n_addresses),
            &n_addresses,
            |b, &n| {
                let state = make_stake_table(n);
                let mut height = 0u64;
                b.iter(|| {
                    height += 1;
                    let mut rng = ChaCha8Rng::seed_from_u64(height);
                    SimpleCommitteeSelector.select_committee(&state, COMMITTEE_SIZE, &mut rng)
                });
            },
        );
    }
    group.finish();
}

fn bench_weighted_stake_sampling(c: &mut Criterion) {
    let mut group = c.benchmark_group("committee/weighted_stake");

    for &n_addresses in &[200usize, 1_000, 10_000] {
        group.throughput(Throughput::Elements(COMMITTEE_SIZE as u64));
        group.bench_with_input(
            BenchmarkId::new("addresses", n_addresses),
            &n_addresses,
            |b, &n| {
                let state = make_weighted_stake_table(n);
                let mut height = 0u64;
                b.iter(|| {
                    height += 1;
                    let mut rng = ChaCha8Rng::seed_from_u64(height);
                    SimpleCommitteeSelector.select_committee(&state, COMMITTEE_SIZE, &mut rng)
                });
            },
        );
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_equal_stake_sampling,
    bench_weighted_stake_sampling,
);
criterion_main!(benches);
