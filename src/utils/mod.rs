// src/utils/mod.rs
//! Utilities module for common functionality
//!
//! Error types shared across the crate and the logging setup used by the
//! binary.

/// Error types and handling utilities
///
/// Contains [`MinerError`] for caller-visible failures and
/// [`ProcessBlockError`] for the consensus processor's verdicts.
pub mod error;

/// Logging configuration and utilities
pub mod logging;

// Re-export for easier access
pub use error::{ErrorCode, MinerError, ProcessBlockError, RuleError};
pub use logging::{init_debug_logging, init_logging};
