// src/miner/session.rs
//! One search attempt on one block template

use crate::config::MinerConfig;
use crate::types::{Block, BlockHash};
use std::time::{Duration, Instant, SystemTime};

/// Where an attempt stands
///
/// An attempt starts out `Searching` and moves to exactly one of the other
/// states. Once there it stays there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Still enumerating nonces
    Searching,
    /// A block was found and submitted
    Solved {
        /// Hash of the submitted block
        hash: BlockHash,
        /// Whether the node put it on the best chain
        accepted: bool,
    },
    /// The template went stale or a sibling solved it
    AbortedStale,
    /// The worker was told to exit
    AbortedShutdown,
}

impl SessionState {
    /// Whether the attempt is over
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionState::Searching)
    }
}

/// Mutable state of one attempt, owned by the worker running it
#[derive(Debug)]
pub(crate) struct SearchSession {
    pub(crate) block: Block,
    pub(crate) parent: BlockHash,
    pub(crate) generated_at: Instant,
    pub(crate) tx_stamp: SystemTime,
    pub(crate) hashes: u64,
    pub(crate) refresh_pending: bool,
    state: SessionState,
}

impl SearchSession {
    pub(crate) fn new(block: Block, tx_stamp: SystemTime) -> Self {
        SearchSession {
            parent: block.header.prev_block,
            block,
            generated_at: Instant::now(),
            tx_stamp,
            hashes: 0,
            refresh_pending: false,
            state: SessionState::Searching,
        }
    }

    pub(crate) fn state(&self) -> SessionState {
        self.state
    }

    pub(crate) fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Moves to `state` unless the attempt has already ended
    pub(crate) fn end(&mut self, state: SessionState) {
        if !self.is_terminal() {
            self.state = state;
        }
    }
}

/// Whether a template of age `age` should be dropped
///
/// Stale once the mempool changed and the template is at least
/// `tx_stale_delay` old, or unconditionally at `max_template_age`.
pub fn is_stale(age: Duration, tx_changed: bool, config: &MinerConfig) -> bool {
    (tx_changed && age >= config.tx_stale_delay()) || age >= config.max_template_age()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BlockHeader;

    fn config() -> MinerConfig {
        MinerConfig {
            tx_stale_delay_ms: 3_000,
            max_template_age_ms: 60_000,
            ..MinerConfig::default()
        }
    }

    #[test]
    fn mempool_change_needs_minimum_age() {
        let cfg = config();
        assert!(!is_stale(Duration::from_millis(2_999), true, &cfg));
        assert!(is_stale(Duration::from_secs(3), true, &cfg));
        assert!(!is_stale(Duration::from_secs(3), false, &cfg));
    }

    #[test]
    fn old_templates_are_stale_regardless() {
        let cfg = config();
        assert!(!is_stale(Duration::from_secs(59), false, &cfg));
        assert!(is_stale(Duration::from_secs(60), false, &cfg));
    }

    #[test]
    fn first_terminal_state_wins() {
        let block = Block {
            header: BlockHeader::default(),
            transactions: Vec::new(),
        };
        let mut session = SearchSession::new(block, SystemTime::now());
        assert_eq!(session.state(), SessionState::Searching);

        session.end(SessionState::AbortedStale);
        session.end(SessionState::AbortedShutdown);
        assert_eq!(session.state(), SessionState::AbortedStale);
    }
}
