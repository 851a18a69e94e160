//! Command-line interface
//!
//! Subcommands:
//! - `start`: mine against an in-memory node until ctrl-c
//! - `generate`: mine a fixed number of blocks
//! - `config`: write a configuration template

/// Clap definitions of the commands and their options
pub mod commands;

pub use commands::{Action, Commands, ConfigOptions, GenerateOptions, StartOptions};
