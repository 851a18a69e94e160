// src/miner/locks.rs
//! Lock ladder of the miner
//!
//! The miner has three mutexes and they are only ever nested in this order:
//!
//! 1. **state**: supervisor bookkeeping (running flag, worker count, pool handle)
//! 2. **submission**: template construction and block submission
//! 3. **validation**: the body of the solution validator
//!
//! Workers never take the state lock. A validator judging a candidate takes
//! submission then validation; a validator answering a null probe takes
//! validation alone. The guards make the order visible in the types: the
//! validation lock can be taken from a [`SubmissionPermit`], while nothing
//! hands out a submission permit from a [`ValidationGuard`].
//!
//! Leaf locks (per-parent counters, sibling registry) live next to their data
//! and are never held across another acquisition.

use parking_lot::{Mutex, MutexGuard};

/// The three ordered locks
#[derive(Debug, Default)]
pub struct LockLadder<S> {
    state: Mutex<S>,
    submission: Mutex<()>,
    validation: Mutex<()>,
}

impl<S> LockLadder<S> {
    /// Wraps the supervisor state
    pub fn new(state: S) -> Self {
        LockLadder {
            state: Mutex::new(state),
            submission: Mutex::new(()),
            validation: Mutex::new(()),
        }
    }

    /// Rung 1
    pub fn state(&self) -> MutexGuard<'_, S> {
        self.state.lock()
    }

    /// Rung 2
    pub fn submission(&self) -> SubmissionPermit<'_> {
        SubmissionPermit {
            _guard: self.submission.lock(),
            validation: &self.validation,
        }
    }

    /// Rung 3, taken without holding the submission lock
    pub fn validation(&self) -> ValidationGuard<'_> {
        ValidationGuard {
            _guard: self.validation.lock(),
        }
    }
}

/// Proof that the submission lock is held
///
/// Template construction and block submission both demand one.
#[must_use]
pub struct SubmissionPermit<'a> {
    _guard: MutexGuard<'a, ()>,
    validation: &'a Mutex<()>,
}

impl SubmissionPermit<'_> {
    /// Rung 3, taken while holding rung 2
    pub fn validation(&self) -> ValidationGuard<'_> {
        ValidationGuard {
            _guard: self.validation.lock(),
        }
    }
}

/// Proof that the validation lock is held
#[must_use]
pub struct ValidationGuard<'a> {
    _guard: MutexGuard<'a, ()>,
}
