//! Core mining functionality
//!
//! This module contains all components of the search:
//! - The supervisor, the public control surface
//! - The pool controller that converges the number of workers
//! - Search workers and the solution validator they hand to the evaluator
//! - The submission gate and the lock ladder that orders everything

/// Miner supervisor
///
/// Starts, stops and resizes the pool and runs discrete generation.
pub mod supervisor;

/// Worker pool controller
///
/// Launches and retires workers to match the configured count and joins
/// them all on shutdown.
pub(crate) mod controller;

/// Search worker implementation
///
/// Sweeps the nonce space of one template at a time, watching for
/// shutdown, sibling solutions and staleness.
pub(crate) mod worker;

/// Solution validator
pub(crate) mod validator;

/// Per-attempt search state and the staleness rule
pub mod session;

/// State shared by all threads of the miner
pub mod context;

/// Block submission gate
pub mod gate;

/// Ordered locks of the miner
pub mod locks;

/// Proof-of-work evaluator seam and reference engine
pub mod pow;

/// Extra-nonce entropy sources
pub mod entropy;

// Re-export main components for cleaner imports
pub use self::context::WorkerId;
pub use self::entropy::{EntropySource, SequentialEntropy, ThreadRngEntropy};
pub use self::gate::{SubmissionGate, SubmitOutcome};
pub use self::pow::{Candidate, PowEngine, PowParams, Sha256dEngine, SolutionValidator, Verdict};
pub use self::session::{SessionState, is_stale};
pub use self::supervisor::CpuMiner;
