//! Statistics collection
//!
//! This module provides:
//! - The speed monitor that turns worker hash reports into a hash rate
//! - Counters describing how search attempts end
//!
//! The main component is [`SpeedMonitor`], which runs on its own thread and
//! publishes its estimate through a lock-free [`RateHandle`].

/// Speed monitor implementation
///
/// The monitor:
/// - Receives hash counts from workers over a channel
/// - Recomputes a windowed rate on a fixed tick
/// - Publishes the rate for synchronous, non-blocking reads
pub mod monitor;

/// Search outcome counters
pub mod counters;

// Re-export main components
pub use counters::{SearchCounters, SearchStats};
pub use monitor::{HashReporter, RateHandle, RateSnapshot, RateWindow, SpeedMonitor};
