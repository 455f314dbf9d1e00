//! Property-based tests for the transaction pool.
//!
//! Properties tested:
//! 1. A valid transaction that was submitted and never committed is still
//!    held by the pool after any sequence of selections and commits.
//! 2. A committed transaction never comes back.
//! 3. A batch never exceeds its size bound, never repeats a transaction and
//!    never contains an invalid one.

#[cfg(test)]
mod tests {
    use {
        proptest::prelude::*,
        std::collections::HashSet,
        tendersim_consensus_bft::{Transaction, TransactionPool},
    };

    #[derive(Debug, Clone)]
    enum PoolOp {
        Submit(u64),
        Select(usize),
        /// Commit the selected transactions whose mask bit is set.
        Commit(u64),
    }

    fn pool_op() -> impl Strategy<Value = PoolOp> {
        prop_oneof![
            3 => (0..40u64).prop_map(PoolOp::Submit),
            2 => (0..8usize).prop_map(PoolOp::Select),
            1 => any::<u64>().prop_map(PoolOp::Commit),
        ]
    }

    /// Every seventh transaction carries no fee and is invalid.
    fn make_tx(n: u64) -> Transaction {
        let fees = if n % 7 == 0 { 0 } else { 1 };
        Transaction::money_transfer(n + 1, format!("sender-{n}"), "receiver", 10, fees)
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 1-3. Random submit / select / commit sequences
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        #[test]
        fn pool_never_loses_uncommitted_transactions(
            ops in prop::collection::vec(pool_op(), 0..120),
        ) {
            let mut pool = TransactionPool::new();
            let mut outstanding: HashSet<Transaction> = HashSet::new();
            let mut committed: HashSet<Transaction> = HashSet::new();
            let mut selected: Vec<Transaction> = Vec::new();

            for op in ops {
                match op {
                    PoolOp::Submit(n) => {
                        let tx = make_tx(n);
                        if committed.contains(&tx) {
                            continue;
                        }
                        let inserted = pool.submit(tx.clone());
                        prop_assert_eq!(inserted, outstanding.insert(tx));
                    }
                    PoolOp::Select(max_size) => {
                        let batch = pool.select_batch(max_size);
                        prop_assert!(batch.len() <= max_size);
                        let distinct: HashSet<&Transaction> = batch.iter().collect();
                        prop_assert_eq!(distinct.len(), batch.len());
                        for tx in &batch {
                            prop_assert!(tx.is_basic_valid());
                            prop_assert!(!committed.contains(tx));
                        }
                        selected.extend(batch);
                    }
                    PoolOp::Commit(mask) => {
                        let block: Vec<Transaction> = selected
                            .drain(..)
                            .enumerate()
                            .filter(|(index, _)| mask & (1 << (index % 64)) != 0)
                            .map(|(_, tx)| tx)
                            .collect();
                        pool.reconcile(&block);
                        for tx in block {
                            outstanding.remove(&tx);
                            committed.insert(tx);
                        }
                    }
                }

                // Invalid transactions may have been discarded by a selection.
                outstanding.retain(|tx| tx.is_basic_valid() || pool.contains(tx));
                for tx in &outstanding {
                    prop_assert!(pool.contains(tx), "lost {}", tx);
                }
                for tx in &committed {
                    prop_assert!(!pool.contains(tx), "committed {} came back", tx);
                }
            }
        }
    }
}
