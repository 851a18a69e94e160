// src/config/config.rs
use crate::{miner::pow::PowParams, node::memory::NodeConfig, types::Network, utils::error::MinerError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for the block miner
///
/// Every table is optional; a missing table or key falls back to the
/// defaults below, so an empty file is a valid configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Worker pool and timing settings
    #[serde(default)]
    pub miner: MinerConfig,

    /// Network selection and consensus-adjacent switches
    #[serde(default)]
    pub network: NetworkConfig,

    /// Block template policy handed to the template builder
    #[serde(default)]
    pub policy: MiningPolicy,

    /// Settings for the in-memory node used by the binary
    #[serde(default)]
    pub node: NodeConfig,
}

/// Worker pool and timing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinerConfig {
    /// Number of search workers (default: number of CPU cores)
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,

    /// How often a pool worker reports hashes and checks for staleness
    #[serde(default = "default_update_interval_ms")]
    pub update_interval_ms: u64,

    /// The same interval for the single worker of discrete generation
    #[serde(default = "default_discrete_update_interval_ms")]
    pub discrete_update_interval_ms: u64,

    /// How often the speed monitor recomputes the hash rate
    #[serde(default = "default_hps_update_interval_ms")]
    pub hps_update_interval_ms: u64,

    /// Template age after which a mempool update makes it stale
    #[serde(default = "default_tx_stale_delay_ms")]
    pub tx_stale_delay_ms: u64,

    /// Template age after which it is stale regardless of the mempool
    #[serde(default = "default_max_template_age_ms")]
    pub max_template_age_ms: u64,

    /// Pause before retrying a failed template build (0 = retry at once)
    #[serde(default)]
    pub template_retry_delay_ms: u64,
}

impl Default for MinerConfig {
    fn default() -> Self {
        MinerConfig {
            worker_threads: default_worker_threads(),
            update_interval_ms: default_update_interval_ms(),
            discrete_update_interval_ms: default_discrete_update_interval_ms(),
            hps_update_interval_ms: default_hps_update_interval_ms(),
            tx_stale_delay_ms: default_tx_stale_delay_ms(),
            max_template_age_ms: default_max_template_age_ms(),
            template_retry_delay_ms: 0,
        }
    }
}

impl MinerConfig {
    /// Worker tick for pool mining
    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms.max(1))
    }

    /// Worker tick for discrete generation
    pub fn discrete_update_interval(&self) -> Duration {
        Duration::from_millis(self.discrete_update_interval_ms.max(1))
    }

    /// Speed monitor tick
    pub fn hps_update_interval(&self) -> Duration {
        Duration::from_millis(self.hps_update_interval_ms.max(1))
    }

    /// Minimum template age before a mempool update makes it stale
    pub fn tx_stale_delay(&self) -> Duration {
        Duration::from_millis(self.tx_stale_delay_ms)
    }

    /// Maximum template age
    pub fn max_template_age(&self) -> Duration {
        Duration::from_millis(self.max_template_age_ms)
    }

    /// Pause between failed template builds
    pub fn template_retry_delay(&self) -> Duration {
        Duration::from_millis(self.template_retry_delay_ms)
    }
}

/// Network selection as written in the config file
///
/// The per-network defaults can be overridden key by key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Which network to mine on
    #[serde(default = "default_network")]
    pub name: Network,

    /// Override whether discrete `generate` is allowed
    #[serde(default)]
    pub generate_supported: Option<bool>,

    /// Override whether the network reduces its minimum difficulty
    #[serde(default)]
    pub reduce_min_difficulty: Option<bool>,

    /// Proof-of-work parameters
    #[serde(default)]
    pub pow: PowParams,

    /// Blocks this node may mine on one parent on a simulation network
    #[serde(default = "default_max_sim_net_to_mine")]
    pub max_sim_net_to_mine: u8,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            name: default_network(),
            generate_supported: None,
            reduce_min_difficulty: None,
            pow: PowParams::default(),
            max_sim_net_to_mine: default_max_sim_net_to_mine(),
        }
    }
}

impl NetworkConfig {
    /// Resolves the overrides against the network's defaults
    pub fn params(&self) -> NetworkParams {
        let base = NetworkParams::for_network(self.name);
        NetworkParams {
            generate_supported: self.generate_supported.unwrap_or(base.generate_supported),
            reduce_min_difficulty: self
                .reduce_min_difficulty
                .unwrap_or(base.reduce_min_difficulty),
            pow: self.pow,
            max_sim_net_to_mine: self.max_sim_net_to_mine,
            ..base
        }
    }
}

/// Resolved network parameters the miner consults at run time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkParams {
    /// The network
    pub network: Network,
    /// Whether discrete generation is allowed
    pub generate_supported: bool,
    /// Whether minimum difficulty drops after a quiet period
    pub reduce_min_difficulty: bool,
    /// Proof-of-work parameters
    pub pow: PowParams,
    /// Simulation-network throttle
    pub max_sim_net_to_mine: u8,
}

impl NetworkParams {
    /// Defaults for a network
    pub fn for_network(network: Network) -> Self {
        let (generate_supported, reduce_min_difficulty) = match network {
            Network::MainNet => (false, false),
            Network::TestNet => (false, true),
            Network::SimNet | Network::RegNet => (true, false),
        };
        NetworkParams {
            network,
            generate_supported,
            reduce_min_difficulty,
            pow: PowParams::default(),
            max_sim_net_to_mine: default_max_sim_net_to_mine(),
        }
    }

    /// Whether the simulation-network safeguards apply
    pub fn is_sim_net(&self) -> bool {
        self.network == Network::SimNet
    }
}

/// Policy handed to the template builder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiningPolicy {
    /// Minimum block size in bytes
    #[serde(default)]
    pub block_min_size: u32,

    /// Maximum block size in bytes
    #[serde(default = "default_block_max_size")]
    pub block_max_size: u32,

    /// Bytes reserved for high-priority transactions
    #[serde(default = "default_block_priority_size")]
    pub block_priority_size: u32,
}

impl Default for MiningPolicy {
    fn default() -> Self {
        MiningPolicy {
            block_min_size: 0,
            block_max_size: default_block_max_size(),
            block_priority_size: default_block_priority_size(),
        }
    }
}

fn default_worker_threads() -> usize {
    num_cpus::get()
}

fn default_update_interval_ms() -> u64 {
    333
}

fn default_discrete_update_interval_ms() -> u64 {
    15_000
}

fn default_hps_update_interval_ms() -> u64 {
    60_000
}

fn default_tx_stale_delay_ms() -> u64 {
    3_000
}

fn default_max_template_age_ms() -> u64 {
    60_000
}

fn default_network() -> Network {
    Network::RegNet
}

fn default_max_sim_net_to_mine() -> u8 {
    4
}

fn default_block_max_size() -> u32 {
    375_000
}

fn default_block_priority_size() -> u32 {
    20_000
}

impl Config {
    /// Loads configuration from a file
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file (TOML format)
    ///
    /// # Returns
    /// * `Ok(Config)` - Successfully loaded configuration
    /// * `Err(MinerError)` - If file couldn't be read or parsed
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, MinerError> {
        let path = path.into();
        let config_str = std::fs::read_to_string(&path).map_err(|e| {
            MinerError::ConfigError(format!(
                "Failed to read config at {}: {}",
                path.display(),
                e
            ))
        })?;

        Self::from_toml(&config_str)
    }

    /// Parses configuration from a TOML string
    pub fn from_toml(config_str: &str) -> Result<Self, MinerError> {
        toml::from_str(config_str)
            .map_err(|e| MinerError::ConfigError(format!("Invalid config format: {}", e)))
    }

    /// Generates a commented configuration template
    ///
    /// # Arguments
    /// * `network` - Network to preselect in the template
    pub fn generate_template(network: Network) -> String {
        let mut template = String::new();
        template.push_str("# Block Miner Configuration\n\n");
        template.push_str("[miner]\n");
        template.push_str("# Number of search workers\n");
        template.push_str(&format!("worker_threads = {}\n", default_worker_threads()));
        template.push_str("# Hash report / staleness check interval per worker\n");
        template.push_str("update_interval_ms = 333\n");
        template.push_str("discrete_update_interval_ms = 15000\n");
        template.push_str("# Hash rate recomputation interval\n");
        template.push_str("hps_update_interval_ms = 60000\n");
        template.push_str("# Staleness thresholds\n");
        template.push_str("tx_stale_delay_ms = 3000\n");
        template.push_str("max_template_age_ms = 60000\n");
        template.push_str("# Pause before retrying a failed template build\n");
        template.push_str("template_retry_delay_ms = 0\n\n");

        template.push_str("[network]\n");
        template.push_str("# Supported networks: mainnet, testnet, simnet, regnet\n");
        template.push_str(&format!("name = \"{}\"\n", network));
        template.push_str("max_sim_net_to_mine = 4\n");
        template.push_str("# generate_supported = true\n");
        template.push_str("# reduce_min_difficulty = false\n\n");

        template.push_str("[network.pow]\n");
        template.push_str("n = 96\n");
        template.push_str("k = 5\n\n");

        template.push_str("[policy]\n");
        template.push_str("block_min_size = 0\n");
        template.push_str("block_max_size = 375000\n");
        template.push_str("block_priority_size = 20000\n\n");

        template.push_str("[node]\n");
        template.push_str("mining_addresses = [\"RsMinerDefaultPayout\"]\n");
        template.push_str("bits = 0x207fffff\n");
        template.push_str("subsidy = 5000000000\n");

        template
    }
}
