//! Tendersim Benchmark Suite
//!
//! Run all benchmarks:
//! ```bash
//! cargo bench -p tendersim-bench
//! ```
//!
//! Run a specific benchmark group:
//! ```bash
//! cargo bench -p tendersim-bench --bench consensus_bench
//! cargo bench -p tendersim-bench --bench committee_bench
//! cargo bench -p tendersim-bench --bench mempool_bench
//! ```

pub mod helpers;
