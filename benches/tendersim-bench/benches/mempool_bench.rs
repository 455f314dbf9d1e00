//! Transaction pool benchmarks.
//!
//! Measures:
//! - Submission throughput including duplicate rejection
//! - Batch selection followed by a commit that keeps half of the batch

use {
    criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput},
    tendersim_consensus_bft::{Transaction, TransactionPool},
};

fn make_transactions(n: usize) -> Vec<Transaction> {
    (0..n as u64)
        .map(|i| Transaction::money_transfer(i + 1, format!("sender-{i}"), "receiver", 100, 1))
        .collect()
}

fn bench_submit(c: &mut Criterion) {
    let mut group = c.benchmark_group("mempool/submit");

    for &n_transactions in &[1_000usize, 10_000] {
        group.throughput(Throughput::Elements(n_transactions as u64 * 2));
        group.bench_with_input(
            BenchmarkId::new("transactions", n_transactions),
            &n_transactions,
            |b, &n| {
                let transactions = make_transactions(n);
                b.iter(|| {
                    let mut pool = TransactionPool::new();
                    // Second pass is rejected as duplicates.
                    for _ in 0..2 {
                        for tx in &transactions {
                            pool.submit(tx.clone());
                        }
                    }
                    pool
                });
            },
        );
    }
    group.finish();
}

fn bench_select_and_reconcile(c: &mut Criterion) {
    let mut group = c.benchmark_group("mempool/select_and_reconcile");

    for &batch_size in &[100usize, 1_000] {
        group.throughput(Throughput::Elements(batch_size as u64));
        group.bench_with_input(
            BenchmarkId::new("batch", batch_size),
            &batch_size,
            |b, &batch_size| {
                let transactions = make_transactions(batch_size * 4);
                b.iter_batched(
                    || {
                        let mut pool = TransactionPool::new();
                        for tx in &transactions {
                            pool.submit(tx.clone());
                        }
                        pool
                    },
                    |mut pool| {
                        let batch = pool.select_batch(batch_size);
                        let committed: Vec<Transaction> =
                            batch.into_iter().step_by(2).collect();
                        pool.reconcile(&committed);
                        pool
                    },
                    BatchSize::SmallInput,
                );
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_submit, bench_select_and_reconcile);
criterion_main!(benches);
