// src/stats/counters.rs
use std::sync::atomic::{AtomicU64, Ordering};

/// Outcome counters of the search, as seen by callers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    /// Templates handed to a worker
    pub templates_built: u64,
    /// Template builds that failed or returned nothing
    pub template_failures: u64,
    /// Attempts that ended with a submitted block
    pub attempts_solved: u64,
    /// Attempts abandoned as stale (timer, mempool, new tip, sibling)
    pub attempts_stale: u64,
    /// Attempts cut short by shutdown or retirement
    pub attempts_shutdown: u64,
    /// Submitted blocks the node accepted
    pub blocks_accepted: u64,
    /// Submitted blocks the node turned down
    pub blocks_rejected: u64,
    /// Abandon notifications delivered to sibling workers
    pub siblings_notified: u64,
    /// Hash reports sent after the speed monitor had stopped
    pub late_reports: u64,
}

/// Atomic version of [`SearchStats`] shared by all workers
#[derive(Debug, Default)]
pub struct SearchCounters {
    templates_built: AtomicU64,
    template_failures: AtomicU64,
    attempts_solved: AtomicU64,
    attempts_stale: AtomicU64,
    attempts_shutdown: AtomicU64,
    blocks_accepted: AtomicU64,
    blocks_rejected: AtomicU64,
    siblings_notified: AtomicU64,
    late_reports: AtomicU64,
}

impl SearchCounters {
    pub(crate) fn template_built(&self) {
        self.templates_built.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn template_failed(&self) {
        self.template_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn attempt_solved(&self, accepted: bool) {
        self.attempts_solved.fetch_add(1, Ordering::Relaxed);
        if accepted {
            self.blocks_accepted.fetch_add(1, Ordering::Relaxed);
        } else {
            self.blocks_rejected.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn attempt_stale(&self) {
        self.attempts_stale.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn attempt_shutdown(&self) {
        self.attempts_shutdown.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn siblings_notified(&self, count: usize) {
        self.siblings_notified
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn report_lost(&self) {
        self.late_reports.fetch_add(1, Ordering::Relaxed);
    }

    /// Gets the current counters
    pub fn snapshot(&self) -> SearchStats {
        SearchStats {
            templates_built: self.templates_built.load(Ordering::Relaxed),
            template_failures: self.template_failures.load(Ordering::Relaxed),
            attempts_solved: self.attempts_solved.load(Ordering::Relaxed),
            attempts_stale: self.attempts_stale.load(Ordering::Relaxed),
            attempts_shutdown: self.attempts_shutdown.load(Ordering::Relaxed),
            blocks_accepted: self.blocks_accepted.load(Ordering::Relaxed),
            blocks_rejected: self.blocks_rejected.load(Ordering::Relaxed),
            siblings_notified: self.siblings_notified.load(Ordering::Relaxed),
            late_reports: self.late_reports.load(Ordering::Relaxed),
        }
    }
}
