// src/miner/validator.rs
//! Solution validator handed to the proof-of-work evaluator
//!
//! Every call runs under the pool-wide validation lock, so at most one
//! validator body executes at any instant. Judging a candidate also holds
//! the submission lock, taken first, so the block can be submitted without
//! letting go of either.

use crate::miner::pow::{Candidate, SolutionValidator, Verdict};
use crate::miner::session::{SearchSession, SessionState};
use crate::miner::worker::SearchWorker;
use crate::types::compact_to_big;

/// Validator bound to one worker's attempt at one nonce
pub(crate) struct SessionValidator<'a> {
    worker: &'a SearchWorker,
    session: &'a mut SearchSession,
    header: &'a [u8],
    nonce: u32,
}

impl<'a> SessionValidator<'a> {
    pub(crate) fn new(
        worker: &'a SearchWorker,
        session: &'a mut SearchSession,
        header: &'a [u8],
        nonce: u32,
    ) -> Self {
        SessionValidator {
            worker,
            session,
            header,
            nonce,
        }
    }

    /// Null probe: the evaluator checking whether it should keep going
    fn probe(&mut self) -> Verdict {
        let _guard = self.worker.ctx.locks.validation();

        if self.session.is_terminal() {
            log::debug!("Shutdown is pending. Bailing out");
            return Verdict::Abort;
        }

        self.worker.poll(self.session);
        // A pending refresh hands control back so the header can be rebuilt.
        if self.session.is_terminal() || self.session.refresh_pending {
            Verdict::Abort
        } else {
            Verdict::Continue
        }
    }

    /// Candidate: check it against the target and submit it if it meets it
    fn judge(&mut self, candidate: &Candidate) -> Verdict {
        let ctx = &self.worker.ctx;
        let permit = ctx.locks.submission();
        let _guard = permit.validation();

        if self.session.is_terminal() {
            return Verdict::Abort;
        }
        if ctx.collab.chain.best_block().0 != self.session.parent {
            self.session.end(SessionState::AbortedStale);
            return Verdict::Abort;
        }

        let block = &mut self.session.block;
        block.header.nonce = self.nonce;
        block.header.pow_solution = ctx.collab.pow.extract(&ctx.network.pow, candidate);
        let hash = block.hash();

        let Some(target) = compact_to_big(block.header.bits) else {
            return Verdict::Continue;
        };
        if hash.to_big() > target {
            return Verdict::Continue;
        }

        if !ctx.collab.pow.verify(
            &ctx.network.pow,
            self.header,
            self.nonce,
            &block.header.pow_solution,
        ) {
            log::debug!("Candidate solution for block {} failed verification", hash);
            return Verdict::Continue;
        }

        let accepted = ctx.gate.submit_block(&permit, block);
        ctx.mined_on_parents.record(block.header.prev_block, block.height());
        let notified = ctx.siblings.notify_others(self.worker.id);
        ctx.stats.siblings_notified(notified);

        self.session.end(SessionState::Solved { hash, accepted });
        Verdict::Solved
    }
}

impl SolutionValidator for SessionValidator<'_> {
    fn validate(&mut self, candidate: Option<&Candidate>) -> Verdict {
        match candidate {
            None => self.probe(),
            Some(candidate) => self.judge(candidate),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::miner::context::MinerContext;
    use crate::miner::entropy::SequentialEntropy;
    use crate::miner::pow::{PowEngine, Sha256dEngine};
    use crate::miner::worker::WorkerSignals;
    use crate::node::{ChainState, Collaborators, MemoryNode, NodeConfig};
    use crate::stats::SpeedMonitor;
    use crate::types::{Block, BlockHash};
    use crate::utils::error::MinerError;
    use crossbeam_channel::tick;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::time::Duration;

    struct Fixture {
        node: Arc<MemoryNode>,
        worker: SearchWorker,
        monitor: SpeedMonitor,
    }

    fn fixture(bits: u32, tick_every: Duration) -> Fixture {
        let node = Arc::new(MemoryNode::new(NodeConfig {
            bits,
            ..NodeConfig::default()
        }));
        let collab = Collaborators::from_node(node.clone(), Arc::new(Sha256dEngine::default()));
        let ctx = Arc::new(MinerContext::new(
            &Config::default(),
            collab,
            Arc::new(SequentialEntropy::new(0)),
        ));
        let monitor = SpeedMonitor::spawn(Duration::from_secs(60)).unwrap();
        let worker = SearchWorker::new(
            None,
            ctx,
            WorkerSignals::detached(),
            monitor.reporter(),
            tick(tick_every),
        );
        Fixture {
            node,
            worker,
            monitor,
        }
    }

    fn session(node: &MemoryNode) -> SearchSession {
        use crate::node::{TemplateSource, TxSource};
        let pay_to = node.mining_address().unwrap();
        let template = node
            .new_block_template(&Default::default(), &pay_to)
            .unwrap()
            .unwrap();
        SearchSession::new(template.block, node.last_updated())
    }

    fn candidate_for(header: &[u8], nonce: u32) -> Candidate {
        use crate::miner::pow::PowParams;

        struct First(Option<Candidate>);
        impl SolutionValidator for First {
            fn validate(&mut self, candidate: Option<&Candidate>) -> Verdict {
                match candidate {
                    Some(c) => {
                        self.0 = Some(c.clone());
                        Verdict::Solved
                    }
                    None => Verdict::Continue,
                }
            }
        }

        let mut first = First(None);
        Sha256dEngine::default().solve(&PowParams::default(), header, nonce, &mut first);
        first.0.unwrap()
    }

    #[test]
    fn probe_continues_on_quiet_session() {
        let f = fixture(0x0300_0001, Duration::from_secs(60));
        let mut s = session(&f.node);
        let mut v = SessionValidator::new(&f.worker, &mut s, b"hdr", 0);
        assert_eq!(v.validate(None), Verdict::Continue);
        f.monitor.stop();
    }

    #[test]
    fn probe_aborts_terminal_session() {
        let f = fixture(0x0300_0001, Duration::from_secs(60));
        let mut s = session(&f.node);
        s.end(SessionState::AbortedStale);
        let mut v = SessionValidator::new(&f.worker, &mut s, b"hdr", 0);
        assert_eq!(v.validate(None), Verdict::Abort);
        f.monitor.stop();
    }

    #[test]
    fn probe_hands_back_control_on_tick() {
        let f = fixture(0x0300_0001, Duration::from_millis(5));
        let mut s = session(&f.node);
        std::thread::sleep(Duration::from_millis(20));
        {
            let mut v = SessionValidator::new(&f.worker, &mut s, b"hdr", 0);
            assert_eq!(v.validate(None), Verdict::Abort);
        }
        assert!(s.refresh_pending);
        assert!(!s.is_terminal());
        f.monitor.stop();
    }

    #[test]
    fn high_hash_candidate_continues() {
        let f = fixture(0x0300_0001, Duration::from_secs(60));
        let mut s = session(&f.node);
        let header = s.block.header.serialize_for_pow().unwrap();
        let candidate = candidate_for(&header, 0);
        {
            let mut v = SessionValidator::new(&f.worker, &mut s, &header, 0);
            assert_eq!(v.validate(Some(&candidate)), Verdict::Continue);
        }
        assert!(!s.is_terminal());
        assert_eq!(f.node.submissions(), 0);
        f.monitor.stop();
    }

    #[test]
    fn forged_candidate_fails_verification() {
        let f = fixture(0x217f_ffff, Duration::from_secs(60));
        let mut s = session(&f.node);
        let header = s.block.header.serialize_for_pow().unwrap();
        let mut candidate = candidate_for(&header, 0);
        let last = candidate.0.len() - 1;
        candidate.0[last] ^= 0xff;
        {
            let mut v = SessionValidator::new(&f.worker, &mut s, &header, 0);
            assert_eq!(v.validate(Some(&candidate)), Verdict::Continue);
        }
        assert_eq!(f.node.submissions(), 0);
        f.monitor.stop();
    }

    #[test]
    fn qualifying_candidate_is_submitted_once() {
        let f = fixture(0x217f_ffff, Duration::from_secs(60));
        let mut s = session(&f.node);
        let header = s.block.header.serialize_for_pow().unwrap();
        let candidate = candidate_for(&header, 0);
        {
            let mut v = SessionValidator::new(&f.worker, &mut s, &header, 0);
            assert_eq!(v.validate(Some(&candidate)), Verdict::Solved);
            // The session is over, a second candidate is refused.
            assert_eq!(v.validate(Some(&candidate)), Verdict::Abort);
        }
        assert_eq!(f.node.submissions(), 1);
        assert!(matches!(
            s.state(),
            SessionState::Solved { accepted: true, .. }
        ));
        f.monitor.stop();
    }

    /// Chain view that flags two callers inside `best_block` at once
    struct WatchedChain {
        node: Arc<MemoryNode>,
        inside: AtomicBool,
        overlaps: AtomicU64,
        calls: AtomicU64,
    }

    impl ChainState for WatchedChain {
        fn best_block(&self) -> (BlockHash, u32) {
            if self.inside.swap(true, Ordering::SeqCst) {
                self.overlaps.fetch_add(1, Ordering::SeqCst);
            }
            std::thread::sleep(Duration::from_micros(20));
            self.inside.store(false, Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.node.best_block()
        }

        fn update_block_time(&self, block: &mut Block) -> Result<(), MinerError> {
            self.node.update_block_time(block)
        }
    }

    #[test]
    fn validator_bodies_never_overlap() {
        const THREADS: usize = 4;
        const ROUNDS: u32 = 200;

        let node = Arc::new(MemoryNode::new(NodeConfig {
            bits: 0x0300_0001,
            ..NodeConfig::default()
        }));
        let chain = Arc::new(WatchedChain {
            node: node.clone(),
            inside: AtomicBool::new(false),
            overlaps: AtomicU64::new(0),
            calls: AtomicU64::new(0),
        });
        let mut collab = Collaborators::from_node(node.clone(), Arc::new(Sha256dEngine::default()));
        collab.chain = chain.clone();
        let ctx = Arc::new(MinerContext::new(
            &Config::default(),
            collab,
            Arc::new(SequentialEntropy::new(0)),
        ));
        let monitor = SpeedMonitor::spawn(Duration::from_secs(60)).unwrap();

        std::thread::scope(|scope| {
            for _ in 0..THREADS {
                let worker = SearchWorker::new(
                    None,
                    ctx.clone(),
                    WorkerSignals::detached(),
                    monitor.reporter(),
                    tick(Duration::from_secs(60)),
                );
                let mut s = session(&node);
                scope.spawn(move || {
                    let header = s.block.header.serialize_for_pow().unwrap();
                    for nonce in 0..ROUNDS {
                        let candidate = candidate_for(&header, nonce);
                        let mut v = SessionValidator::new(&worker, &mut s, &header, nonce);
                        assert_eq!(v.validate(None), Verdict::Continue);
                        assert_eq!(v.validate(Some(&candidate)), Verdict::Continue);
                    }
                });
            }
        });

        // One chain lookup per empty call and one per candidate.
        assert_eq!(chain.calls.load(Ordering::SeqCst), 2 * THREADS as u64 * ROUNDS as u64);
        assert_eq!(chain.overlaps.load(Ordering::SeqCst), 0);
        assert_eq!(node.submissions(), 0);
        monitor.stop();
    }

    #[test]
    fn candidate_on_old_parent_is_stale() {
        let f = fixture(0x217f_ffff, Duration::from_secs(60));
        let mut old = session(&f.node);

        let mut fresh = session(&f.node);
        let header = fresh.block.header.serialize_for_pow().unwrap();
        let candidate = candidate_for(&header, 0);
        {
            let mut v = SessionValidator::new(&f.worker, &mut fresh, &header, 0);
            assert_eq!(v.validate(Some(&candidate)), Verdict::Solved);
        }

        let header = old.block.header.serialize_for_pow().unwrap();
        let candidate = candidate_for(&header, 1);
        {
            let mut v = SessionValidator::new(&f.worker, &mut old, &header, 1);
            assert_eq!(v.validate(Some(&candidate)), Verdict::Abort);
        }
        assert_eq!(old.state(), SessionState::AbortedStale);
        assert_eq!(f.node.submissions(), 1);
        f.monitor.stop();
    }
}
