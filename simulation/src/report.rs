//! Post-run verification and statistics.

use {
    crate::{
        error::ReportError,
        network::NetworkStats,
        runner::{SimulationOutcome, StopReason},
    },
    log::*,
    std::{
        collections::{BTreeMap, BTreeSet, HashSet},
        sync::Arc,
    },
    tendersim_consensus_bft::{Block, Ledger, NodeId, TimeoutSchedule, Transaction},
};

/// Result of comparing every validator's chain height by height.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainVerification {
    /// Lowest ledger height among the validators.
    pub min_height: u64,
    /// Highest ledger height among the validators.
    pub max_height: u64,
    /// Heights at which two validators hold different blocks.
    pub mismatched_heights: Vec<u64>,
    pub correct: bool,
}

/// Compare the ledgers height by height.
///
/// A height is a mismatch only if two validators hold different blocks
/// there. A validator that has not reached a height yet does not count.
pub fn verify_blockchains<'a, I>(ledgers: I) -> ChainVerification
where
    I: IntoIterator<Item = &'a Ledger>,
{
    let ledgers: Vec<&Ledger> = ledgers.into_iter().collect();
    let min_height = ledgers
        .iter()
        .map(|ledger| ledger.current_height())
        .min()
        .unwrap_or(0);
    let max_height = ledgers
        .iter()
        .map(|ledger| ledger.current_height())
        .max()
        .unwrap_or(0);

    let mismatched_heights: Vec<u64> = (0..=max_height)
        .filter(|height| {
            let hashes: BTreeSet<&str> = ledgers
                .iter()
                .filter_map(|ledger| ledger.get_block(*height))
                .map(|block| block.sha256_base64_hash())
                .collect();
            hashes.len() > 1
        })
        .collect();

    ChainVerification {
        min_height,
        max_height,
        correct: mismatched_heights.is_empty(),
        mismatched_heights,
    }
}

/// Mean current timeout per step across validators.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeoutAverages {
    pub propose: f64,
    pub prevote: f64,
    pub precommit: f64,
}

pub fn average_timeouts<'a, I>(schedules: I) -> Result<TimeoutAverages, ReportError>
where
    I: IntoIterator<Item = &'a TimeoutSchedule>,
{
    let schedules: Vec<&TimeoutSchedule> = schedules.into_iter().collect();
    if schedules.is_empty() {
        return Err(ReportError::NoValidators);
    }
    let mean = |value: fn(&TimeoutSchedule) -> u64| {
        schedules.iter().map(|schedule| value(schedule) as f64).sum::<f64>()
            / schedules.len() as f64
    };
    Ok(TimeoutAverages {
        propose: mean(TimeoutSchedule::propose),
        prevote: mean(TimeoutSchedule::prevote),
        precommit: mean(TimeoutSchedule::precommit),
    })
}

/// Min, max and mean of a sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Distribution {
    pub min: u64,
    pub max: u64,
    pub mean: f64,
    pub count: usize,
}

impl Distribution {
    pub fn from_values<I: IntoIterator<Item = u64>>(values: I) -> Option<Self> {
        let mut count = 0;
        let mut sum = 0u128;
        let mut min = u64::MAX;
        let mut max = 0;
        for value in values {
            count += 1;
            sum += u128::from(value);
            min = min.min(value);
            max = max.max(value);
        }
        (count > 0).then(|| Self {
            min,
            max,
            mean: sum as f64 / count as f64,
            count,
        })
    }
}

/// Rounds needed to commit, over every validator's height→round map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoundStats {
    pub rounds: Distribution,
    /// Committed heights that needed more than round 0.
    pub heights_with_round_change: usize,
}

pub fn round_stats<'a, I>(height_rounds: I) -> Option<RoundStats>
where
    I: IntoIterator<Item = &'a BTreeMap<u64, u32>>,
{
    let rounds: Vec<u32> = height_rounds
        .into_iter()
        .flat_map(|map| map.values().copied())
        .collect();
    let heights_with_round_change = rounds.iter().filter(|round| **round > 0).count();
    Distribution::from_values(rounds.into_iter().map(u64::from)).map(|rounds| RoundStats {
        rounds,
        heights_with_round_change,
    })
}

/// Timestamp gaps between consecutive blocks.
pub fn block_intervals(ledger: &Ledger) -> Option<Distribution> {
    let timestamps: Vec<u64> = ledger.iter().map(|block| block.timestamp()).collect();
    Distribution::from_values(
        timestamps
            .windows(2)
            .map(|pair| pair[1].saturating_sub(pair[0])),
    )
}

/// Transactions per block for the blocks above `genesis_height`.
pub fn block_fill(ledger: &Ledger, genesis_height: u64) -> Option<Distribution> {
    Distribution::from_values(
        ledger
            .iter()
            .filter(|block| block.height() > genesis_height)
            .map(|block| block.transactions().len() as u64),
    )
}

/// One-line description of a block for the chain dump.
pub fn describe_block(block: &Block) -> String {
    format!(
        "block {} timestamp {} size {} hash {} previous {}",
        block.height(),
        block.timestamp(),
        block.transactions().len(),
        block.sha256_base64_hash(),
        block.previous()
    )
}

/// Number of `sent` transactions absent from `ledger`.
pub fn missing_transactions(sent: &[Transaction], ledger: &Ledger) -> usize {
    let included: HashSet<&Transaction> = ledger
        .iter()
        .flat_map(|block| block.transactions().iter())
        .collect();
    sent.iter().filter(|tx| !included.contains(tx)).count()
}

/// Transactions that appear more than once in `ledger`.
pub fn duplicate_transactions(ledger: &Ledger) -> usize {
    let mut seen = HashSet::new();
    ledger
        .iter()
        .flat_map(|block| block.transactions().iter())
        .filter(|tx| !seen.insert(*tx))
        .count()
}

/// Everything computed from a finished run.
#[derive(Debug, Clone)]
pub struct SimulationReport {
    pub verification: ChainVerification,
    pub timeouts: Result<TimeoutAverages, ReportError>,
    pub rounds: Option<RoundStats>,
    /// Computed on the longest chain.
    pub block_intervals: Option<Distribution>,
    /// Genesis chain excluded.
    pub block_fill: Option<Distribution>,
    /// The longest chain, dumped block by block at `debug`.
    pub chain: Vec<Arc<Block>>,
    pub client_transactions: usize,
    pub missing_transactions: BTreeMap<NodeId, usize>,
    pub duplicate_transactions: BTreeMap<NodeId, usize>,
    pub network: NetworkStats,
    pub stop_reason: StopReason,
    pub final_time: u64,
}

impl SimulationReport {
    pub fn from_outcome(outcome: &SimulationOutcome) -> Self {
        let engines = &outcome.validators;
        let longest = engines
            .iter()
            .max_by_key(|engine| engine.ledger().current_height())
            .map(|engine| engine.ledger());

        Self {
            verification: verify_blockchains(engines.iter().map(|engine| engine.ledger())),
            timeouts: average_timeouts(engines.iter().map(|engine| engine.timeouts())),
            rounds: round_stats(engines.iter().map(|engine| engine.height_rounds())),
            block_intervals: longest.and_then(block_intervals),
            block_fill: longest.and_then(|ledger| block_fill(ledger, outcome.genesis_height)),
            chain: longest
                .map(|ledger| ledger.iter().cloned().collect())
                .unwrap_or_default(),
            client_transactions: outcome.client_transactions.len(),
            missing_transactions: engines
                .iter()
                .map(|engine| {
                    (
                        engine.identity(),
                        missing_transactions(&outcome.client_transactions, engine.ledger()),
                    )
                })
                .collect(),
            duplicate_transactions: engines
                .iter()
                .map(|engine| (engine.identity(), duplicate_transactions(engine.ledger())))
                .collect(),
            network: outcome.stats.network.clone(),
            stop_reason: outcome.stop_reason,
            final_time: outcome.final_time,
        }
    }

    pub fn is_correct(&self) -> bool {
        self.verification.correct
    }

    pub fn log_summary(&self) {
        if log_enabled!(Level::Debug) {
            for block in &self.chain {
                debug!("{}", describe_block(block));
                for tx in block.transactions() {
                    trace!("    {tx}");
                }
            }
        }
        info!(
            "stopped at tick {} ({:?})",
            self.final_time, self.stop_reason
        );
        info!(
            "heights: min {} max {}",
            self.verification.min_height, self.verification.max_height
        );
        if self.verification.correct {
            info!("blockchain verification: correct");
        } else {
            error!(
                "blockchain verification: mismatch at heights {:?}",
                self.verification.mismatched_heights
            );
        }

        match &self.timeouts {
            Ok(averages) => info!(
                "average timeouts: propose {:.1} prevote {:.1} precommit {:.1}",
                averages.propose, averages.prevote, averages.precommit
            ),
            Err(err) => error!("average timeouts: {err}"),
        }
        if let Some(rounds) = &self.rounds {
            info!(
                "rounds per height: min {} max {} mean {:.2}, {} heights needed a round change",
                rounds.rounds.min,
                rounds.rounds.max,
                rounds.rounds.mean,
                rounds.heights_with_round_change
            );
        }
        if let Some(intervals) = &self.block_intervals {
            info!(
                "block interval: min {} max {} mean {:.2}",
                intervals.min, intervals.max, intervals.mean
            );
        }
        if let Some(fill) = &self.block_fill {
            info!(
                "transactions per block: min {} max {} mean {:.2}",
                fill.min, fill.max, fill.mean
            );
        }

        info!("client transactions sent: {}", self.client_transactions);
        for (id, missing) in &self.missing_transactions {
            info!("{id}: {missing} client transactions not in chain");
        }
        for (id, duplicates) in &self.duplicate_transactions {
            if *duplicates > 0 {
                warn!("{id}: {duplicates} duplicate transactions in chain");
            }
        }
        info!(
            "network: {} sent, {} lost ({:.1}% delivered)",
            self.network.messages_sent,
            self.network.messages_dropped_loss,
            self.network.delivery_rate() * 100.0
        );
    }
}
