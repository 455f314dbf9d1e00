use {
    std::collections::HashSet,
    tendersim_simulation::{
        report::{average_timeouts, duplicate_transactions},
        ReportError, Simulation, SimulationConfig, SimulationOutcome, SimulationReport,
        StopReason,
    },
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn run(config: SimulationConfig) -> SimulationOutcome {
    Simulation::new(config).unwrap().run().unwrap()
}

fn tip_hashes(outcome: &SimulationOutcome) -> Vec<String> {
    outcome
        .validators
        .iter()
        .map(|engine| engine.ledger().tip().sha256_base64_hash().to_string())
        .collect()
}

#[test]
fn test_validators_agree_and_reach_max_height() {
    init_logging();
    let config = SimulationConfig::dev_default();
    let max_height = config.bft.max_height;
    let outcome = run(config);

    assert!(matches!(outcome.stop_reason, StopReason::Halted(_)));
    let report = SimulationReport::from_outcome(&outcome);
    assert!(report.is_correct(), "{:?}", report.verification);
    assert_eq!(report.verification.max_height, max_height);
    for engine in &outcome.validators {
        assert!(engine.ledger().verify_chain().is_ok());
        assert_eq!(duplicate_transactions(engine.ledger()), 0);
    }
    assert_eq!(outcome.stats.engine_errors, 0);
}

#[test]
fn test_client_transactions_reach_the_chain() {
    init_logging();
    let mut config = SimulationConfig::dev_default();
    config.bft.max_height = 40;
    let outcome = run(config);

    assert!(!outcome.client_transactions.is_empty());
    let report = SimulationReport::from_outcome(&outcome);
    assert!(report.is_correct());
    // Some client transfer made it into the longest chain.
    let longest = outcome
        .validators
        .iter()
        .max_by_key(|engine| engine.ledger().current_height())
        .unwrap();
    let sent: HashSet<_> = outcome.client_transactions.iter().collect();
    assert!(longest
        .ledger()
        .iter()
        .flat_map(|block| block.transactions())
        .any(|tx| sent.contains(tx)));
}

#[test]
fn test_same_seed_same_run() {
    let first = run(SimulationConfig::dev_default());
    let second = run(SimulationConfig::dev_default());
    assert_eq!(tip_hashes(&first), tip_hashes(&second));
    assert_eq!(first.final_time, second.final_time);
    assert_eq!(first.stats, second.stats);
    assert_eq!(first.client_transactions, second.client_transactions);
}

#[test]
fn test_agreement_under_packet_loss() {
    init_logging();
    for seed in 0..3 {
        let mut config = SimulationConfig::dev_default();
        config.seed = seed;
        config.network.packet_loss_rate = 0.05;
        config.max_ticks = 100_000;
        let outcome = run(config);
        let report = SimulationReport::from_outcome(&outcome);
        assert!(report.is_correct(), "seed {seed}: {:?}", report.verification);
        assert!(outcome.stats.network.messages_dropped_loss > 0);
    }
}

#[test]
fn test_larger_network_with_sampled_committee() {
    init_logging();
    let mut config = SimulationConfig::dev_default();
    config.validators = 10;
    config.bft.committee_size = 4;
    let outcome = run(config);
    let report = SimulationReport::from_outcome(&outcome);
    assert!(report.is_correct(), "{:?}", report.verification);
    assert!(report.verification.max_height > 0);
    // Non-members still follow the chain.
    assert!(outcome
        .validators
        .iter()
        .all(|engine| !engine.height_rounds().is_empty()));
}

#[test]
fn test_timeout_averages_need_validators() {
    let outcome = run(SimulationConfig::dev_default());
    assert!(average_timeouts(outcome.validators.iter().map(|engine| engine.timeouts())).is_ok());
    assert_eq!(
        average_timeouts(std::iter::empty()),
        Err(ReportError::NoValidators)
    );
}

#[test]
fn test_invalid_config_rejected() {
    let mut config = SimulationConfig::dev_default();
    config.bft.committee_size = 1;
    assert!(Simulation::new(config).is_err());
}
