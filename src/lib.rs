//! Block Miner - concurrent CPU block production in Rust
//!
//! This crate provides the mining subsystem of a full node:
//! - A resizable pool of search workers driven by a supervisor
//! - Cooperative cancellation on shutdown, staleness and sibling solutions
//! - Serialized solution validation and block submission
//! - Hash rate monitoring
//!
//! Template construction, consensus and proof-of-work evaluation are reached
//! through the traits in [`node`] and [`miner::pow`].

#![warn(missing_docs)]
#![forbid(unsafe_code)]

/// Miner core: supervisor, controller, workers and validator
pub mod miner;

/// Boundary with the node and an in-memory reference node
pub mod node;

/// Statistics collection and reporting functionality
pub mod stats;

/// Utility functions and error handling
pub mod utils;

/// Command-line interface definitions
pub mod cli;

/// Configuration management
pub mod config;

/// Shared type definitions
pub mod types;

// Core exports
pub use cli::Commands;
pub use config::Config;
pub use miner::{CpuMiner, PowEngine, Sha256dEngine, SolutionValidator, Verdict};
pub use node::{Collaborators, MemoryNode, NodeConfig};
pub use stats::{SearchStats, SpeedMonitor};
pub use types::{Block, BlockHash, Network};
pub use utils::{MinerError, init_logging};
