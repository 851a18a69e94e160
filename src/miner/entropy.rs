// src/miner/entropy.rs
//! Source of the random extra-nonce offset chosen for every template
//! attempt. Tests swap in a fixed source to make the search deterministic.

use std::sync::atomic::{AtomicU64, Ordering};

/// Supplies extra-nonce offsets
pub trait EntropySource: Send + Sync {
    /// Next offset
    fn next_u64(&self) -> u64;
}

/// Thread-local OS-seeded randomness
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRngEntropy;

impl EntropySource for ThreadRngEntropy {
    fn next_u64(&self) -> u64 {
        rand::random()
    }
}

/// Counts up from a seed, one step per call
#[derive(Debug, Default)]
pub struct SequentialEntropy {
    next: AtomicU64,
}

impl SequentialEntropy {
    /// Starts the sequence at `seed`
    pub fn new(seed: u64) -> Self {
        SequentialEntropy {
            next: AtomicU64::new(seed),
        }
    }
}

impl EntropySource for SequentialEntropy {
    fn next_u64(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}
