// src/main.rs
use block_miner::{self, *};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tokio::runtime::Runtime;

/// Main entry point for the block miner
///
/// # Returns
/// - `Ok(())` on successful execution
/// - `Err(MinerError)` if any operation fails
///
/// # Flow
/// 1. Parses command line arguments
/// 2. Delegates to appropriate subcommand handler
/// 3. Propagates any errors upward
fn main() -> Result<(), MinerError> {
    let cli = cli::Commands::parse();

    match cli.action {
        cli::Action::Start(opts) => start_mining(opts),
        cli::Action::Generate(opts) => generate_blocks(opts),
        cli::Action::Config(opts) => generate_config(opts),
    }
}

/// Mines against an in-memory node until ctrl-c
///
/// # Operations
/// 1. Initializes logging
/// 2. Loads configuration and applies CLI overrides
/// 3. Starts the miner with the configured worker count
/// 4. Logs the hash rate and chain height until interrupted
/// 5. Stops the miner, joining every worker
fn start_mining(opts: cli::StartOptions) -> Result<(), MinerError> {
    if opts.verbose {
        utils::init_debug_logging();
    } else {
        utils::init_logging();
    }

    let mut config = load_config(&opts.config)?;
    if let Some(network) = opts.network {
        config.network.name = network;
    }

    let node = Arc::new(MemoryNode::new(config.node.clone()));
    let miner = CpuMiner::new(
        &config,
        Collaborators::from_node(node.clone(), Arc::new(Sha256dEngine::default())),
    );
    if let Some(workers) = opts.workers {
        miner.set_num_workers(workers);
    }
    miner.start();

    let status_every = config.miner.hps_update_interval();
    let rt = Runtime::new()?;
    rt.block_on(async {
        let mut status = tokio::time::interval(status_every);
        status.tick().await;
        loop {
            tokio::select! {
                res = tokio::signal::ctrl_c() => {
                    if let Err(e) = res {
                        log::error!("Failed to listen for ctrl-c: {}", e);
                    }
                    break;
                }
                _ = status.tick() => {
                    let tip = node.tip();
                    log::info!(
                        "{} workers, {:.2} H/s, height {} ({})",
                        miner.running_workers(),
                        miner.hashes_per_second(),
                        tip.height,
                        tip.hash
                    );
                }
            }
        }
    });

    log::info!("Shutting down");
    miner.stop();

    let stats = miner.stats();
    log::info!(
        "Blocks accepted: {}, rejected: {}, stale attempts: {}",
        stats.blocks_accepted,
        stats.blocks_rejected,
        stats.attempts_stale
    );
    Ok(())
}

/// Mines a fixed number of blocks and prints their hashes
fn generate_blocks(opts: cli::GenerateOptions) -> Result<(), MinerError> {
    utils::init_logging();

    let mut config = load_config(&opts.config)?;
    if let Some(network) = opts.network {
        config.network.name = network;
    }

    let node = Arc::new(MemoryNode::new(config.node.clone()));
    let miner = CpuMiner::new(
        &config,
        Collaborators::from_node(node, Arc::new(Sha256dEngine::default())),
    );

    let started = std::time::Instant::now();
    let hashes = miner.generate_n_blocks(opts.blocks)?;
    for hash in &hashes {
        println!("{}", hash);
    }
    log::info!(
        "Generated {} blocks in {:.1}s",
        hashes.len(),
        started.elapsed().as_secs_f64()
    );
    log::logger().flush();
    Ok(())
}

/// Generates configuration template file
///
/// # Arguments
/// * `opts` - Configuration generation options
fn generate_config(opts: cli::ConfigOptions) -> Result<(), MinerError> {
    let config = config::generate_template(opts.network);
    std::fs::write(opts.output, config)?;
    Ok(())
}

/// Loads the config file, falling back to defaults when it does not exist
fn load_config(path: &Path) -> Result<Config, MinerError> {
    if path.exists() {
        config::load(path)
    } else {
        log::warn!("No config at {}, using defaults", path.display());
        Ok(Config::default())
    }
}
