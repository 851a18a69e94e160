// tests/common/mod.rs
#![allow(dead_code)]

use block_miner::miner::{Candidate, PowEngine, PowParams, SolutionValidator};
use block_miner::{Collaborators, Config, CpuMiner, MemoryNode, NodeConfig, Sha256dEngine};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Every hash meets this target
pub const EASY_BITS: u32 = 0x217f_ffff;
/// Target of 1, never met
pub const HARD_BITS: u32 = 0x0300_0001;

pub fn node(bits: u32) -> Arc<MemoryNode> {
    Arc::new(MemoryNode::new(NodeConfig {
        bits,
        ..NodeConfig::default()
    }))
}

pub fn config(workers: usize) -> Config {
    let mut config = Config::default();
    config.miner.worker_threads = workers;
    config.miner.update_interval_ms = 10;
    config.miner.hps_update_interval_ms = 100;
    config
}

pub fn miner_with(config: &Config, node: &Arc<MemoryNode>, pow: Arc<dyn PowEngine>) -> CpuMiner {
    CpuMiner::new(config, Collaborators::from_node(node.clone(), pow))
}

pub fn sha_miner(config: &Config, node: &Arc<MemoryNode>) -> CpuMiner {
    miner_with(config, node, Arc::new(Sha256dEngine::default()))
}

/// Polls `cond` until it holds or `timeout` passes
pub fn wait_for(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    cond()
}

/// Probes once per call, then on its `k`th armed call offers one candidate
pub struct ArmedEngine {
    pub armed: AtomicBool,
    pub calls: AtomicU64,
    pub k: u64,
}

impl ArmedEngine {
    pub fn new(k: u64) -> Self {
        ArmedEngine {
            armed: AtomicBool::new(false),
            calls: AtomicU64::new(0),
            k,
        }
    }
}

impl PowEngine for ArmedEngine {
    fn solve(
        &self,
        _params: &PowParams,
        _header: &[u8],
        nonce: u32,
        validator: &mut dyn SolutionValidator,
    ) {
        if validator.validate(None).is_stop() {
            return;
        }
        if self.armed.load(Ordering::SeqCst) && self.calls.fetch_add(1, Ordering::SeqCst) + 1 == self.k
        {
            validator.validate(Some(&Candidate(nonce.to_le_bytes().to_vec())));
        }
    }

    fn verify(&self, _params: &PowParams, _header: &[u8], nonce: u32, proof: &[u8]) -> bool {
        proof == &nonce.to_le_bytes()[..]
    }

    fn extract(&self, _params: &PowParams, candidate: &Candidate) -> Vec<u8> {
        candidate.0.clone()
    }
}

/// Offers a candidate on every call and flags overlapping verifications
#[derive(Default)]
pub struct OverlapEngine {
    inside: AtomicBool,
    pub overlaps: AtomicU64,
    pub verifies: AtomicU64,
}

impl PowEngine for OverlapEngine {
    fn solve(
        &self,
        _params: &PowParams,
        _header: &[u8],
        nonce: u32,
        validator: &mut dyn SolutionValidator,
    ) {
        if validator.validate(None).is_stop() {
            return;
        }
        validator.validate(Some(&Candidate(nonce.to_le_bytes().to_vec())));
    }

    fn verify(&self, _params: &PowParams, _header: &[u8], _nonce: u32, _proof: &[u8]) -> bool {
        if self.inside.swap(true, Ordering::SeqCst) {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        thread::sleep(Duration::from_micros(50));
        self.inside.store(false, Ordering::SeqCst);
        self.verifies.fetch_add(1, Ordering::SeqCst);
        // Never accept, so the search keeps going.
        false
    }

    fn extract(&self, _params: &PowParams, candidate: &Candidate) -> Vec<u8> {
        candidate.0.clone()
    }
}
