// src/miner/pow/mod.rs
//! Proof-of-work seam
//!
//! The search itself is delegated to an external evaluator. The miner hands
//! it serialized header bytes and a nonce together with a
//! [`SolutionValidator`]; the evaluator calls the validator back with either
//! a null probe or a candidate until the validator answers with a stop
//! verdict.

/// Reference evaluator based on double SHA-256
///
/// Small enough to run in tests and in the demo binary. It does no real
/// combinatorial search; each call emits a bounded run of hashed candidates.
pub mod sha256d;

use serde::{Deserialize, Serialize};

pub use self::sha256d::Sha256dEngine;

/// Parameters of the proof-of-work puzzle, opaque to the miner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowParams {
    /// Width parameter
    pub n: u32,
    /// Length parameter
    pub k: u32,
}

impl Default for PowParams {
    fn default() -> Self {
        PowParams { n: 96, k: 5 }
    }
}

/// Opaque solution handle produced by the evaluator
///
/// The miner never looks inside; it asks the engine to
/// [`extract`](PowEngine::extract) the proof bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate(pub Vec<u8>);

/// Answer of the validator to the evaluator
///
/// The numeric values are the protocol: 0 continue, 1 stop with success,
/// 2 stop and abort. Once the evaluator sees a non-zero code it must return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Verdict {
    /// Keep searching
    Continue = 0,
    /// A block was solved and submitted
    Solved = 1,
    /// Stop, the attempt is over or the worker needs control back
    Abort = 2,
}

impl Verdict {
    /// Protocol code of the verdict
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Whether the evaluator has to return
    pub fn is_stop(self) -> bool {
        self != Verdict::Continue
    }
}

/// Callback the evaluator drives
pub trait SolutionValidator {
    /// Judges a candidate, or just checks in when `candidate` is `None`
    fn validate(&mut self, candidate: Option<&Candidate>) -> Verdict;
}

/// External proof-of-work evaluator, verifier and proof extractor
pub trait PowEngine: Send + Sync {
    /// Searches the proof space for `header` and `nonce`, calling
    /// `validator` until it returns a stop verdict or the space is exhausted
    fn solve(
        &self,
        params: &PowParams,
        header: &[u8],
        nonce: u32,
        validator: &mut dyn SolutionValidator,
    );

    /// Independently checks a proof
    fn verify(&self, params: &PowParams, header: &[u8], nonce: u32, proof: &[u8]) -> bool;

    /// Pulls the proof bytes out of a candidate
    fn extract(&self, params: &PowParams, candidate: &Candidate) -> Vec<u8>;
}
