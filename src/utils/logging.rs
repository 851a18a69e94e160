// src/utils/logging.rs
//! Logging configuration
//!
//! Sets up `env_logger` for the binary. The library itself only talks to
//! the `log` facade, so embedding nodes are free to install their own logger.

use env_logger::{Builder, Target};
use log::LevelFilter;
use std::env;

/// Initializes logging at `Info`, or at whatever `RUST_LOG` asks for
pub fn init_logging() {
    init_with_default(LevelFilter::Info);
}

/// Initializes logging at `Debug` unless `RUST_LOG` says otherwise
///
/// Used by `--verbose` runs, where the per-template and per-tick
/// messages of the workers are worth seeing.
pub fn init_debug_logging() {
    init_with_default(LevelFilter::Debug);
}

fn init_with_default(level: LevelFilter) {
    let mut builder = common_log_config();

    if env::var("RUST_LOG").is_err() {
        builder.filter_level(level);
    } else {
        builder.parse_env("RUST_LOG");
    }

    builder.init();
}

/// Base logger: `[ts LEVEL thread module:line] message` on stdout
fn common_log_config() -> Builder {
    let mut builder = Builder::new();

    builder
        .format(|buf, record| {
            use std::io::Write;
            let ts = buf.timestamp_millis();
            let level = record.level();
            let thread = std::thread::current();
            let module = record.module_path().unwrap_or_default();
            let line = record.line().unwrap_or(0);

            writeln!(
                buf,
                "[{} {} {} {}:{}] {}",
                ts,
                level,
                thread.name().unwrap_or("-"),
                module,
                line,
                record.args()
            )
        })
        .target(Target::Stdout);

    builder
}
