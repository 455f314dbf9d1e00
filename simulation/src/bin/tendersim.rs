use {
    clap::{crate_description, crate_version, value_t, App, Arg, ArgMatches},
    log::*,
    std::process::exit,
    tendersim_simulation::{Simulation, SimulationConfig, SimulationReport},
};

fn build_config(matches: &ArgMatches) -> Result<SimulationConfig, String> {
    let mut config = match matches.value_of("config") {
        Some(path) => SimulationConfig::from_toml_file(path)
            .map_err(|err| format!("failed to load {path}: {err}"))?,
        None => SimulationConfig::default(),
    };
    if matches.is_present("seed") {
        config.seed = value_t!(matches, "seed", u64).map_err(|err| err.to_string())?;
    }
    if matches.is_present("validators") {
        config.validators =
            value_t!(matches, "validators", usize).map_err(|err| err.to_string())?;
    }
    if matches.is_present("clients") {
        config.clients = value_t!(matches, "clients", usize).map_err(|err| err.to_string())?;
    }
    if matches.is_present("max_height") {
        config.bft.max_height =
            value_t!(matches, "max_height", u64).map_err(|err| err.to_string())?;
    }
    if matches.is_present("committee_size") {
        config.bft.committee_size =
            value_t!(matches, "committee_size", usize).map_err(|err| err.to_string())?;
    }
    if matches.is_present("max_block_size") {
        config.bft.max_block_size =
            value_t!(matches, "max_block_size", usize).map_err(|err| err.to_string())?;
    }
    if matches.is_present("packet_loss") {
        config.network.packet_loss_rate =
            value_t!(matches, "packet_loss", f64).map_err(|err| err.to_string())?;
    }
    config.validate().map_err(|err| err.to_string())?;
    Ok(config)
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = App::new("tendersim")
        .version(crate_version!())
        .about(crate_description!())
        .arg(
            Arg::with_name("config")
                .long("config")
                .value_name("FILE")
                .takes_value(true)
                .help("TOML configuration file"),
        )
        .arg(
            Arg::with_name("seed")
                .long("seed")
                .value_name("NUMBER")
                .takes_value(true)
                .help("Seed of the simulation"),
        )
        .arg(
            Arg::with_name("validators")
                .long("validators")
                .value_name("COUNT")
                .takes_value(true)
                .help("Number of validators"),
        )
        .arg(
            Arg::with_name("clients")
                .long("clients")
                .value_name("COUNT")
                .takes_value(true)
                .help("Number of transaction-sending clients"),
        )
        .arg(
            Arg::with_name("max_height")
                .long("max-height")
                .value_name("HEIGHT")
                .takes_value(true)
                .help("Height after which validators halt"),
        )
        .arg(
            Arg::with_name("committee_size")
                .long("committee-size")
                .value_name("SIZE")
                .takes_value(true)
                .help("Number of validators sampled per height"),
        )
        .arg(
            Arg::with_name("max_block_size")
                .long("max-block-size")
                .value_name("SIZE")
                .takes_value(true)
                .help("Maximum number of transactions per block"),
        )
        .arg(
            Arg::with_name("packet_loss")
                .long("packet-loss")
                .value_name("RATE")
                .takes_value(true)
                .help("Probability in [0, 1] that a message is lost"),
        )
        .get_matches();

    let config = match build_config(&matches) {
        Ok(config) => config,
        Err(err) => {
            error!("{err}");
            exit(2);
        }
    };

    let outcome = match Simulation::new(config).and_then(Simulation::run) {
        Ok(outcome) => outcome,
        Err(err) => {
            error!("simulation failed: {err}");
            exit(1);
        }
    };

    let report = SimulationReport::from_outcome(&outcome);
    report.log_summary();
    if !report.is_correct() {
        exit(1);
    }
}
