// src/miner/worker.rs
//! Search worker
//!
//! A worker repeatedly takes a fresh block template and sweeps its
//! extra-nonce and nonce space, handing each header to the proof-of-work
//! evaluator. Between evaluator calls it polls its signals:
//! - quit: closed by the controller, ends the worker
//! - abandon: a sibling solved the current block, ends the attempt
//! - ticker: report hashes, test for staleness, refresh the timestamp

use crate::miner::context::{LiveGuard, MinerContext, WorkerId};
use crate::miner::session::{SearchSession, SessionState, is_stale};
use crate::miner::validator::SessionValidator;
use crate::stats::HashReporter;
use crate::types::{Block, BlockHash};
use crate::utils::error::MinerError;
use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError, never};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cancellation signals of one worker
pub(crate) struct WorkerSignals {
    /// Closed (never sent on) when the worker must exit
    pub(crate) quit: Receiver<()>,
    /// Single slot, filled when a sibling solved the current block
    pub(crate) abandon: Receiver<()>,
}

impl WorkerSignals {
    /// Signals that never fire, for the worker of discrete generation
    pub(crate) fn detached() -> Self {
        WorkerSignals {
            quit: never(),
            abandon: never(),
        }
    }
}

/// One search worker
pub(crate) struct SearchWorker {
    pub(crate) id: Option<WorkerId>,
    pub(crate) ctx: Arc<MinerContext>,
    signals: WorkerSignals,
    reporter: HashReporter,
    ticker: Receiver<Instant>,
}

impl SearchWorker {
    pub(crate) fn new(
        id: Option<WorkerId>,
        ctx: Arc<MinerContext>,
        signals: WorkerSignals,
        reporter: HashReporter,
        ticker: Receiver<Instant>,
    ) -> Self {
        SearchWorker {
            id,
            ctx,
            signals,
            reporter,
            ticker,
        }
    }

    /// Pool worker loop, runs until the quit signal closes
    pub(crate) fn run(self) {
        let _live = LiveGuard::enter(&self.ctx.live_workers);
        log::trace!("Starting generate blocks worker {}", self.label());

        while !self.quit_requested() {
            let Some(block) = self.next_template() else {
                if self.pause(self.ctx.config.template_retry_delay()) {
                    break;
                }
                continue;
            };

            if self.over_sim_net_limit(&block) {
                log::trace!(
                    "too many blocks mined on parent, stopping until there are enough votes on these to make a new block"
                );
                if self.pause(self.ctx.config.update_interval()) {
                    break;
                }
                continue;
            }

            if self.solve_and_submit(block) == SessionState::AbortedShutdown {
                break;
            }
        }

        log::trace!("Generate blocks worker {} done", self.label());
    }

    /// Discrete generation loop, returns once `n` blocks were accepted
    pub(crate) fn generate(&self, n: u32) -> Vec<BlockHash> {
        let _live = LiveGuard::enter(&self.ctx.live_workers);
        let mut hashes = Vec::with_capacity(n as usize);

        while hashes.len() < n as usize {
            let Some(block) = self.next_template() else {
                self.pause(self.ctx.config.template_retry_delay());
                continue;
            };

            match self.solve_and_submit(block) {
                SessionState::Solved {
                    hash,
                    accepted: true,
                } => hashes.push(hash),
                SessionState::AbortedShutdown => break,
                _ => {}
            }
        }

        hashes
    }

    /// Builds the next template under the submission lock
    fn next_template(&self) -> Option<Block> {
        let template = {
            let permit = self.ctx.locks.submission();
            // Whatever was solved before this point is already on the chain.
            while self.signals.abandon.try_recv().is_ok() {}
            self.ctx.gate.build_template(&permit, &self.ctx.policy)
        };

        match template {
            Ok(Some(template)) => {
                self.ctx.stats.template_built();
                Some(template.block)
            }
            Ok(None) => {
                self.ctx.stats.template_failed();
                log::debug!("Not enough voters on parent block and failed to pull parent template");
                None
            }
            Err(MinerError::AddressError(e)) => {
                self.ctx.stats.template_failed();
                log::error!("Failed to get mining address: {}", e);
                None
            }
            Err(e) => {
                self.ctx.stats.template_failed();
                log::error!("Failed to create new block template: {}", e);
                None
            }
        }
    }

    fn over_sim_net_limit(&self, block: &Block) -> bool {
        self.ctx.network.is_sim_net()
            && self.ctx.mined_on_parents.count(&block.header.prev_block)
                >= self.ctx.network.max_sim_net_to_mine
    }

    /// Sweeps the extra-nonce and nonce space of one template
    pub(crate) fn solve_and_submit(&self, block: Block) -> SessionState {
        let mut session = SearchSession::new(block, self.ctx.collab.tx_source.last_updated());
        let offset = self.ctx.entropy.next_u64();
        let params = self.ctx.network.pow;
        let pow = &self.ctx.collab.pow;

        'extra: for extra_nonce in 0..=u64::MAX {
            session
                .block
                .header
                .set_extra_nonce(extra_nonce.wrapping_add(offset));
            let mut header = match session.block.header.serialize_for_pow() {
                Ok(bytes) => bytes,
                Err(e) => {
                    log::warn!("CPU miner unable to serialize block header: {}", e);
                    session.end(SessionState::AbortedStale);
                    break;
                }
            };

            for nonce in 0..=u32::MAX {
                self.poll(&mut session);
                if session.is_terminal() {
                    break 'extra;
                }

                if session.refresh_pending {
                    session.refresh_pending = false;
                    if let Err(e) = self.ctx.collab.chain.update_block_time(&mut session.block) {
                        log::warn!("CPU miner unable to update block template time: {}", e);
                        session.end(SessionState::AbortedStale);
                        break 'extra;
                    }
                    header = match session.block.header.serialize_for_pow() {
                        Ok(bytes) => bytes,
                        Err(e) => {
                            log::warn!(
                                "CPU miner unable to rebuild header data for updated block template time: {}",
                                e
                            );
                            session.end(SessionState::AbortedStale);
                            break 'extra;
                        }
                    };
                }

                session.block.header.nonce = nonce;
                let mut validator = SessionValidator::new(self, &mut session, &header, nonce);
                pow.solve(&params, &header, nonce, &mut validator);
                session.hashes += 1;

                if session.is_terminal() {
                    break 'extra;
                }
            }
        }

        // The whole space was swept without a result.
        session.end(SessionState::AbortedStale);
        self.report_hashes(session.hashes);
        self.record(session.state())
    }

    /// Non-blocking check of every signal
    ///
    /// Ends the session on shutdown, abandonment or a moved chain tip. A
    /// timer fire either ends it as stale or flags a timestamp refresh.
    pub(crate) fn poll(&self, session: &mut SearchSession) {
        if session.is_terminal() {
            return;
        }

        if self.quit_requested() {
            log::info!("Miner is stopping");
            session.end(SessionState::AbortedShutdown);
            return;
        }

        if self.signals.abandon.try_recv().is_ok() {
            log::debug!("Worker {} abandoning block solved by a sibling", self.label());
            session.end(SessionState::AbortedStale);
            return;
        }

        if self.ctx.collab.chain.best_block().0 != session.parent {
            log::debug!("Best block moved past parent {}", session.parent);
            session.end(SessionState::AbortedStale);
            return;
        }

        if self.ticker.try_recv().is_ok() {
            self.on_tick(session);
        }
    }

    fn on_tick(&self, session: &mut SearchSession) {
        log::debug!("Miner is updating time for currently mined block");
        self.report_hashes(std::mem::take(&mut session.hashes));

        let tx_changed = self.ctx.collab.tx_source.last_updated() != session.tx_stamp;
        if is_stale(session.generated_at.elapsed(), tx_changed, &self.ctx.config) {
            session.end(SessionState::AbortedStale);
        } else {
            session.refresh_pending = true;
        }
    }

    fn report_hashes(&self, hashes: u64) {
        if !self.reporter.report(hashes) {
            log::warn!(
                "Worker {} reported {} hashes after the speed monitor stopped",
                self.label(),
                hashes
            );
            self.ctx.stats.report_lost();
        }
    }

    fn record(&self, state: SessionState) -> SessionState {
        match state {
            SessionState::Solved { accepted, .. } => self.ctx.stats.attempt_solved(accepted),
            SessionState::AbortedShutdown => self.ctx.stats.attempt_shutdown(),
            SessionState::AbortedStale | SessionState::Searching => {
                self.ctx.stats.attempt_stale()
            }
        }
        state
    }

    fn quit_requested(&self) -> bool {
        !matches!(self.signals.quit.try_recv(), Err(TryRecvError::Empty))
    }

    /// Waits up to `delay`, returning early with `true` on quit
    fn pause(&self, delay: Duration) -> bool {
        if delay.is_zero() {
            return self.quit_requested();
        }
        !matches!(
            self.signals.quit.recv_timeout(delay),
            Err(RecvTimeoutError::Timeout)
        )
    }

    fn label(&self) -> String {
        match self.id {
            Some(id) => id.to_string(),
            None => "discrete".to_string(),
        }
    }
}
