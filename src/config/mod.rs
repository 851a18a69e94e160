// src/config/mod.rs
//! Configuration management for the block miner
//!
//! This module handles:
//! - Loading and parsing configuration files
//! - Generating configuration templates
//! - Resolving per-network parameters
//!
//! The configuration uses TOML format.

/// Core configuration implementation
///
/// Contains the [`Config`] struct and related types that define
/// the miner's configuration structure and behavior.
pub mod config;

// Re-export key items for easy access
pub use config::{Config, MinerConfig, MiningPolicy, NetworkConfig, NetworkParams};

use crate::types::Network;
use crate::utils::error::MinerError;
use std::path::PathBuf;

/// Loads miner configuration from a TOML file
///
/// # Arguments
/// * `path` - Path to the configuration file (anything convertible to PathBuf)
///
/// # Returns
/// * `Ok(Config)` - Successfully loaded configuration
/// * `Err(MinerError)` - If the file couldn't be read or parsed
pub fn load(path: impl Into<PathBuf>) -> Result<Config, MinerError> {
    Config::load(path)
}

/// Generates a commented configuration template for `network`
pub fn generate_template(network: Network) -> String {
    Config::generate_template(network)
}
