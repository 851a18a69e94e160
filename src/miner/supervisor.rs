// src/miner/supervisor.rs
//! Public control surface of the CPU miner
//!
//! [`CpuMiner`] starts and stops the worker pool, resizes it while it runs,
//! answers rate queries and runs discrete generation of a fixed number of
//! blocks. Every operation is safe to call from any thread; the bookkeeping
//! lives behind the state lock, the first rung of the lock ladder.

use crate::config::Config;
use crate::miner::context::MinerContext;
use crate::miner::controller;
use crate::miner::entropy::{EntropySource, ThreadRngEntropy};
use crate::miner::worker::{SearchWorker, WorkerSignals};
use crate::node::Collaborators;
use crate::stats::{RateHandle, SearchStats, SpeedMonitor};
use crate::types::BlockHash;
use crate::utils::error::MinerError;
use crossbeam_channel::{Sender, bounded, tick, unbounded};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread::JoinHandle;

/// Supervisor bookkeeping, guarded by the state lock
pub(crate) struct MinerState {
    num_workers: usize,
    started: bool,
    discrete: bool,
    pool: Option<RunningPool>,
    rate: Option<RateHandle>,
}

impl MinerState {
    pub(crate) fn new(num_workers: usize) -> Self {
        MinerState {
            num_workers,
            started: false,
            discrete: false,
            pool: None,
            rate: None,
        }
    }
}

/// Handles of a running pool
struct RunningPool {
    /// Dropped to shut the pool down
    shutdown: Sender<()>,
    updates: Sender<usize>,
    controller: JoinHandle<()>,
}

/// CPU block miner
///
/// # Example
/// ```no_run
/// use block_miner::{Collaborators, Config, CpuMiner, MemoryNode, Sha256dEngine};
/// use std::sync::Arc;
///
/// let node = Arc::new(MemoryNode::new(Default::default()));
/// let miner = CpuMiner::new(
///     &Config::default(),
///     Collaborators::from_node(node, Arc::new(Sha256dEngine::default())),
/// );
/// miner.start();
/// miner.set_num_workers(2);
/// miner.stop();
/// ```
pub struct CpuMiner {
    ctx: Arc<MinerContext>,
}

impl CpuMiner {
    /// Creates a stopped miner
    pub fn new(config: &Config, collab: Collaborators) -> Self {
        Self::with_entropy(config, collab, Arc::new(ThreadRngEntropy))
    }

    /// Creates a stopped miner drawing extra-nonce offsets from `entropy`
    pub fn with_entropy(
        config: &Config,
        collab: Collaborators,
        entropy: Arc<dyn EntropySource>,
    ) -> Self {
        CpuMiner {
            ctx: Arc::new(MinerContext::new(config, collab, entropy)),
        }
    }

    /// Starts pool mining
    ///
    /// Does nothing if the miner is already running, in either mode.
    pub fn start(&self) {
        let mut state = self.ctx.locks.state();
        if state.started || state.discrete {
            return;
        }

        let monitor = match SpeedMonitor::spawn(self.ctx.config.hps_update_interval()) {
            Ok(monitor) => monitor,
            Err(e) => {
                log::error!("Failed to start CPU miner speed monitor: {}", e);
                return;
            }
        };
        let rate = monitor.rate_handle();

        let (shutdown_tx, shutdown_rx) = bounded(1);
        let (updates_tx, updates_rx) = unbounded();
        let controller = match controller::spawn(
            self.ctx.clone(),
            monitor,
            state.num_workers,
            shutdown_rx,
            updates_rx,
        ) {
            Ok(handle) => handle,
            Err(e) => {
                log::error!("Failed to start CPU miner controller: {}", e);
                return;
            }
        };

        state.pool = Some(RunningPool {
            shutdown: shutdown_tx,
            updates: updates_tx,
            controller,
        });
        state.rate = Some(rate);
        state.started = true;
        log::info!("CPU miner started");
    }

    /// Stops pool mining and waits for every worker to exit
    ///
    /// Does nothing if the miner is not running or is generating discretely.
    pub fn stop(&self) {
        let mut state = self.ctx.locks.state();
        if !state.started || state.discrete {
            return;
        }

        if let Some(pool) = state.pool.take() {
            drop(pool.shutdown);
            drop(pool.updates);
            if pool.controller.join().is_err() {
                log::error!("CPU miner controller panicked");
            }
        }
        state.rate = None;
        state.started = false;
        log::info!("CPU miner stopped");
    }

    /// Sets the number of workers
    ///
    /// Zero stops mining, a negative count selects one worker per CPU core.
    /// A running pool converges to the new count.
    pub fn set_num_workers(&self, num_workers: i32) {
        if num_workers == 0 {
            self.stop();
        }

        let mut state = self.ctx.locks.state();
        state.num_workers = usize::try_from(num_workers).unwrap_or_else(|_| num_cpus::get());

        if let Some(pool) = &state.pool {
            if pool.updates.send(state.num_workers).is_err() {
                log::warn!("CPU miner controller is gone, resize ignored");
            }
        }
    }

    /// Configured number of workers
    pub fn num_workers(&self) -> usize {
        self.ctx.locks.state().num_workers
    }

    /// Whether the miner is running, in either mode
    pub fn is_mining(&self) -> bool {
        self.ctx.locks.state().started
    }

    /// Worker threads currently alive
    pub fn running_workers(&self) -> usize {
        self.ctx.live_workers.load(Ordering::SeqCst)
    }

    /// Current hash rate, 0 when not running
    pub fn hashes_per_second(&self) -> f64 {
        let state = self.ctx.locks.state();
        match (&state.rate, state.started) {
            (Some(rate), true) => rate.hashes_per_second(),
            _ => 0.0,
        }
    }

    /// Search counters since the miner was created
    pub fn stats(&self) -> SearchStats {
        self.ctx.stats.snapshot()
    }

    /// Mines `n` blocks on the calling thread and returns their hashes
    ///
    /// # Errors
    /// * [`MinerError::GenerateUnsupported`] on networks where CPU mining is
    ///   not realistic
    /// * [`MinerError::AlreadyMining`] while the miner is running
    /// * [`MinerError::IoError`] if the speed monitor cannot be started
    pub fn generate_n_blocks(&self, n: u32) -> Result<Vec<BlockHash>, MinerError> {
        let monitor = {
            let mut state = self.ctx.locks.state();

            if !self.ctx.network.generate_supported {
                return Err(MinerError::GenerateUnsupported(
                    self.ctx.network.network.to_string(),
                ));
            }
            if state.started || state.discrete {
                return Err(MinerError::AlreadyMining);
            }
            if n == 0 {
                return Ok(Vec::new());
            }

            let monitor = SpeedMonitor::spawn(self.ctx.config.hps_update_interval())?;
            state.rate = Some(monitor.rate_handle());
            state.started = true;
            state.discrete = true;
            monitor
        };

        log::trace!("Generating {} blocks", n);
        let worker = SearchWorker::new(
            None,
            self.ctx.clone(),
            WorkerSignals::detached(),
            monitor.reporter(),
            tick(self.ctx.config.discrete_update_interval()),
        );
        let hashes = worker.generate(n);
        drop(worker);
        log::trace!("Generated {} blocks", hashes.len());

        let mut state = self.ctx.locks.state();
        monitor.stop();
        state.rate = None;
        state.started = false;
        state.discrete = false;
        Ok(hashes)
    }
}

impl Drop for CpuMiner {
    fn drop(&mut self) {
        self.stop();
    }
}
