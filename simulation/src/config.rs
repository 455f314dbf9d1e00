//! Configuration for a simulation run.
//!
//! Loaded from TOML. Every table and field is optional; missing values take
//! the defaults below.
//!
//! ```toml
//! seed = 7
//! validators = 10
//! clients = 3
//!
//! [bft]
//! max_height = 50
//! committee_size = 7
//!
//! [network]
//! packet_loss_rate = 0.02
//! ```

use {
    crate::error::{Result, SimulationError},
    serde::{Deserialize, Serialize},
    std::path::Path,
    tendersim_consensus_bft::BftConfig,
};

/// Top-level configuration of a simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Seed of every random draw the harness makes.
    pub seed: u64,
    /// Number of validator actors.
    pub validators: usize,
    /// Number of seed (discovery) nodes.
    pub seed_nodes: usize,
    /// Number of client actors submitting transactions.
    pub clients: usize,
    /// Logical time after which the run stops even if validators are still
    /// working.
    pub max_ticks: u64,
    pub bft: BftConfig,
    pub network: NetworkConfig,
    pub client: ClientConfig,
    pub genesis: GenesisConfig,
    pub discovery: DiscoveryConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            validators: 4,
            seed_nodes: 1,
            clients: 2,
            max_ticks: 1_000_000,
            bft: BftConfig::default(),
            network: NetworkConfig::default(),
            client: ClientConfig::default(),
            genesis: GenesisConfig::default(),
            discovery: DiscoveryConfig::default(),
        }
    }
}

/// Latency and loss of the simulated network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Smallest delivery delay in ticks.
    pub min_latency: u64,
    /// Largest delivery delay in ticks.
    pub max_latency: u64,
    /// Probability in `[0, 1]` that a delivery is dropped.
    pub packet_loss_rate: f64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            min_latency: 1,
            max_latency: 5,
            packet_loss_rate: 0.0,
        }
    }
}

/// Behavior of the transaction-submitting clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub min_time_between_sending: u64,
    pub max_time_between_sending: u64,
    /// Number of sending rounds before the client stops.
    pub nb_sending_tx: usize,
    /// Number of validators each client sends to.
    pub nb_connection_to_validator: usize,
    /// Smallest number of transactions created per sending round.
    pub min_tx_created: usize,
    /// Largest number of transactions created per sending round.
    pub max_tx_created: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            min_time_between_sending: 150,
            max_time_between_sending: 250,
            nb_sending_tx: 500,
            nb_connection_to_validator: 3,
            min_tx_created: 50,
            max_tx_created: 150,
        }
    }
}

/// Shape of the initial chain shared by all validators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenesisConfig {
    /// Smallest coin allowance of a validator (inclusive).
    pub min_coin: u64,
    /// Largest coin allowance of a validator (exclusive).
    pub max_coin: u64,
    /// Lock time of the initial stake transactions.
    pub min_lock_time: u64,
}

impl Default for GenesisConfig {
    fn default() -> Self {
        Self {
            min_coin: 10,
            max_coin: 2000,
            min_lock_time: 50,
        }
    }
}

/// Seed nodes that join the network after it started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Seed nodes unknown to everyone at start. They register with the root
    /// seed nodes once started.
    pub late_seed_nodes: usize,
    /// Earliest start of a late seed node, in ticks.
    pub min_start_delay: u64,
    /// Latest start of a late seed node, in ticks.
    pub max_start_delay: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            late_seed_nodes: 0,
            min_start_delay: 2_000,
            max_start_delay: 15_000,
        }
    }
}

/// Actor counts converted to node ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActorCounts {
    pub validators: u32,
    pub seed_nodes: u32,
    pub clients: u32,
    pub late_seed_nodes: u32,
}

impl SimulationConfig {
    /// Read and validate a TOML configuration file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Parse and validate a TOML configuration.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<()> {
        self.bft.validate()?;
        let invalid = |reason: String| Err(SimulationError::InvalidSimulationConfig(reason));
        if self.validators == 0 {
            return invalid("validators must be > 0".to_string());
        }
        if self.seed_nodes == 0 {
            return invalid("seed_nodes must be > 0".to_string());
        }
        self.actor_counts()?;
        if self.network.min_latency == 0 || self.network.min_latency > self.network.max_latency {
            return invalid(format!(
                "latency range [{}, {}] must be non-empty and start above 0",
                self.network.min_latency, self.network.max_latency
            ));
        }
        if !(0.0..=1.0).contains(&self.network.packet_loss_rate) {
            return invalid(format!(
                "packet_loss_rate must be in [0, 1], got {}",
                self.network.packet_loss_rate
            ));
        }
        if self.client.min_time_between_sending == 0
            || self.client.min_time_between_sending > self.client.max_time_between_sending
        {
            return invalid("client sending interval must be a non-empty range above 0".to_string());
        }
        if self.client.min_tx_created > self.client.max_tx_created {
            return invalid("min_tx_created must not exceed max_tx_created".to_string());
        }
        if self.discovery.min_start_delay > self.discovery.max_start_delay {
            return invalid(format!(
                "late seed start range [{}, {}] is empty",
                self.discovery.min_start_delay, self.discovery.max_start_delay
            ));
        }
        if self.genesis.min_coin < 2 || self.genesis.min_coin >= self.genesis.max_coin {
            return invalid(format!(
                "genesis coin range [{}, {}) must be non-empty and start at 2 or more",
                self.genesis.min_coin, self.genesis.max_coin
            ));
        }
        Ok(())
    }

    /// Actor counts as node ids. Every actor needs a distinct `u32` id, so
    /// the counts together must fit in one.
    pub fn actor_counts(&self) -> Result<ActorCounts> {
        let too_many = || {
            SimulationError::InvalidSimulationConfig(format!(
                "{} validators, {} seed nodes, {} clients and {} late seed nodes exceed \
                 the node id space",
                self.validators, self.seed_nodes, self.clients, self.discovery.late_seed_nodes
            ))
        };
        let id_count = |count: usize| u32::try_from(count).map_err(|_| too_many());
        let counts = ActorCounts {
            validators: id_count(self.validators)?,
            seed_nodes: id_count(self.seed_nodes)?,
            clients: id_count(self.clients)?,
            late_seed_nodes: id_count(self.discovery.late_seed_nodes)?,
        };
        counts
            .validators
            .checked_add(counts.seed_nodes)
            .and_then(|total| total.checked_add(counts.clients))
            .and_then(|total| total.checked_add(counts.late_seed_nodes))
            .ok_or_else(too_many)?;
        Ok(counts)
    }

    /// A small, fast configuration for tests.
    #[cfg(any(test, feature = "dev-context-only-utils"))]
    pub fn dev_default() -> Self {
        Self {
            seed: 42,
            validators: 4,
            seed_nodes: 1,
            clients: 2,
            max_ticks: 200_000,
            bft: BftConfig {
                max_height: 20,
                max_block_size: 20,
                committee_size: 4,
                ..BftConfig::default()
            },
            network: NetworkConfig::default(),
            client: ClientConfig {
                min_time_between_sending: 20,
                max_time_between_sending: 40,
                nb_sending_tx: 10,
                nb_connection_to_validator: 2,
                min_tx_created: 3,
                max_tx_created: 8,
            },
            genesis: GenesisConfig {
                min_coin: 10,
                max_coin: 40,
                min_lock_time: 50,
            },
            discovery: DiscoveryConfig::default(),
        }
    }
}
