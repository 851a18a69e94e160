// src/cli/commands.rs
use crate::types::Network;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Block Miner CLI - concurrent CPU block production in Rust
#[derive(Parser, Debug)]
#[command(name = "block-miner")]
#[command(version, about, long_about = None)]
pub struct Commands {
    /// The action to perform (start mining, generate blocks, or generate config)
    #[command(subcommand)]
    pub action: Action,
}

/// Top-level commands for the miner application
#[derive(Subcommand, Debug)]
pub enum Action {
    /// Mine against an in-memory node until interrupted
    Start(StartOptions),

    /// Mine a fixed number of blocks and print their hashes
    Generate(GenerateOptions),

    /// Generate configuration file template
    Config(ConfigOptions),
}

/// Options for starting the mining operation
#[derive(Parser, Debug)]
pub struct StartOptions {
    /// Path to configuration file (defaults are used when missing)
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Number of worker threads to use (overrides config, negative = one per core)
    #[arg(short, long, allow_negative_numbers = true)]
    pub workers: Option<i32>,

    /// Network to mine on (overrides config)
    #[arg(short, long)]
    pub network: Option<Network>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Options for discrete block generation
#[derive(Parser, Debug)]
pub struct GenerateOptions {
    /// Path to configuration file (defaults are used when missing)
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Number of blocks to mine
    #[arg(short, long, default_value_t = 1)]
    pub blocks: u32,

    /// Network to mine on (overrides config)
    #[arg(short, long)]
    pub network: Option<Network>,
}

/// Options for generating configuration files
#[derive(Parser, Debug)]
pub struct ConfigOptions {
    /// Output file path
    #[arg(short, long, default_value = "config.toml")]
    pub output: PathBuf,

    /// Network the template is written for
    #[arg(short, long, value_enum, default_value_t = Network::RegNet)]
    pub network: Network,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_generate() {
        let cli = Commands::try_parse_from(["block-miner", "generate", "--blocks", "3"]).unwrap();
        match cli.action {
            Action::Generate(opts) => {
                assert_eq!(opts.blocks, 3);
                assert!(opts.network.is_none());
            }
            other => panic!("unexpected action {:?}", other),
        }
    }

    #[test]
    fn parses_negative_worker_count() {
        let cli = Commands::try_parse_from(["block-miner", "start", "-w", "-1", "-n", "simnet"])
            .unwrap();
        match cli.action {
            Action::Start(opts) => {
                assert_eq!(opts.workers, Some(-1));
                assert_eq!(opts.network, Some(Network::SimNet));
            }
            other => panic!("unexpected action {:?}", other),
        }
    }
}
