// src/utils/error.rs
use crate::types::BlockHash;
use std::fmt;
use std::io;
use thiserror::Error;

/// Main error type for the block miner
///
/// Only a handful of these ever reach a caller of the miner itself: the
/// configuration errors raised by `generate_n_blocks` and the header errors
/// that end a search attempt. Everything else is surfaced by the
/// collaborators or by loading configuration.
#[derive(Error, Debug)]
pub enum MinerError {
    /// Discrete generation requested on a network where CPU mining is hopeless
    #[error(
        "no support for `generate` on the current network, {0}, as it's unlikely to be possible to CPU-mine a block."
    )]
    GenerateUnsupported(String),

    /// Discrete generation requested while the miner is already active
    #[error(
        "server is already CPU mining. Please call `setgenerate 0` before calling discrete `generate` commands"
    )]
    AlreadyMining,

    /// Header could not be serialized for the proof-of-work evaluator
    #[error("Header serialization error: {0}")]
    HeaderError(String),

    /// Block timestamp could not be refreshed against the chain state
    #[error("Block time update failed: {0}")]
    TimeUpdateError(String),

    /// Template builder failure
    #[error("Block template error: {0}")]
    TemplateError(String),

    /// Payout address could not be resolved
    #[error("Mining address error: {0}")]
    AddressError(String),

    /// Standard I/O operation errors
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    /// Configuration file or parameter errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Invalid user input or parameter errors
    #[error("Invalid input: {0}")]
    InputError(String),
}

/// Converts hex decoding errors into MinerError
///
/// Used when a block hash or payout address given on the command line or
/// in a config file is not valid hex.
impl From<hex::FromHexError> for MinerError {
    fn from(e: hex::FromHexError) -> Self {
        MinerError::InputError(format!("Hex conversion failed: {}", e))
    }
}

/// Consensus rule that a submitted block violated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Block hash is above the target encoded in its header
    HighHash,
    /// Block does not extend a known block
    PrevBlockNotBest,
    /// Block is already known
    DuplicateBlock,
    /// Timestamp is not acceptable for the parent
    BadTimestamp,
    /// Difficulty bits do not match the expected value
    UnexpectedDifficulty,
    /// Anything else the consensus layer rejects
    Other,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::HighHash => write!(f, "ErrHighHash"),
            ErrorCode::PrevBlockNotBest => write!(f, "ErrPrevBlockNotBest"),
            ErrorCode::DuplicateBlock => write!(f, "ErrDuplicateBlock"),
            ErrorCode::BadTimestamp => write!(f, "ErrBadTimestamp"),
            ErrorCode::UnexpectedDifficulty => write!(f, "ErrUnexpectedDifficulty"),
            ErrorCode::Other => write!(f, "ErrOther"),
        }
    }
}

/// A structured consensus rule violation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}: {description}")]
pub struct RuleError {
    /// Which rule was broken
    pub code: ErrorCode,
    /// Human readable detail
    pub description: String,
}

impl RuleError {
    /// Creates a rule error with the given code and description
    pub fn new(code: ErrorCode, description: impl Into<String>) -> Self {
        RuleError {
            code,
            description: description.into(),
        }
    }
}

/// Outcome of handing a block to the consensus processor when it is not
/// accepted
#[derive(Error, Debug)]
pub enum ProcessBlockError {
    /// The block broke a consensus rule
    #[error(transparent)]
    Rule(#[from] RuleError),

    /// Something unrelated to the block itself went wrong
    #[error("internal error: {0}")]
    Internal(String),
}

impl ProcessBlockError {
    /// Returns the rule code when this is a rule violation
    pub fn rule_code(&self) -> Option<ErrorCode> {
        match self {
            ProcessBlockError::Rule(rule) => Some(rule.code),
            ProcessBlockError::Internal(_) => None,
        }
    }
}

/// Shorthand for rule errors about a specific parent
pub(crate) fn not_best_parent(prev: &BlockHash) -> ProcessBlockError {
    RuleError::new(
        ErrorCode::PrevBlockNotBest,
        format!("previous block {} is not the current tip", prev),
    )
    .into()
}
