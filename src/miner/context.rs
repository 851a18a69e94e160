// src/miner/context.rs
//! State shared by the supervisor, the controller and every worker

use crate::config::{Config, MinerConfig, MiningPolicy, NetworkParams};
use crate::miner::entropy::EntropySource;
use crate::miner::gate::SubmissionGate;
use crate::miner::locks::LockLadder;
use crate::miner::supervisor::MinerState;
use crate::node::Collaborators;
use crate::stats::SearchCounters;
use crate::types::BlockHash;
use crossbeam_channel::Sender;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Identifier of a pool worker, assigned sequentially by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(pub u32);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Blocks this node has mined on each parent
///
/// Entries are keyed by parent and remember the height of the blocks mined
/// on it. Recording a block forgets every parent below it, so only the
/// parents at the current chain tip are kept.
///
/// Leaf lock: never held while taking another.
#[derive(Debug, Default)]
pub struct MinedOnParents(Mutex<HashMap<BlockHash, (u32, u8)>>);

impl MinedOnParents {
    /// Blocks mined on `parent` so far
    pub fn count(&self, parent: &BlockHash) -> u8 {
        self.0.lock().get(parent).map_or(0, |(_, count)| *count)
    }

    /// Records one more block at `height` mined on `parent`
    pub fn record(&self, parent: BlockHash, height: u32) {
        let mut counts = self.0.lock();
        counts.retain(|_, (mined_at, _)| *mined_at >= height);
        let (_, count) = counts.entry(parent).or_insert((height, 0));
        *count = count.saturating_add(1);
    }

    /// Number of parents tracked
    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    /// Whether no parent is tracked
    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }
}

/// Abandon slots of the live pool workers
///
/// Leaf lock. Sends are `try_send` on single-slot channels, so notifying
/// never blocks while the registry is read-locked.
#[derive(Debug, Default)]
pub struct SiblingRegistry {
    slots: RwLock<Vec<(WorkerId, Sender<()>)>>,
}

impl SiblingRegistry {
    pub(crate) fn register(&self, id: WorkerId, abandon: Sender<()>) {
        self.slots.write().push((id, abandon));
    }

    pub(crate) fn unregister(&self, id: WorkerId) {
        self.slots.write().retain(|(slot, _)| *slot != id);
    }

    /// Tells every worker except `except` to drop its current template
    ///
    /// Returns how many notifications were delivered. A full slot already
    /// carries a pending notification and is skipped.
    pub(crate) fn notify_others(&self, except: Option<WorkerId>) -> usize {
        self.slots
            .read()
            .iter()
            .filter(|(id, _)| Some(*id) != except)
            .filter(|(_, abandon)| abandon.try_send(()).is_ok())
            .count()
    }

    /// Number of registered workers
    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    /// Whether no worker is registered
    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }
}

/// Everything a worker needs, shared behind one `Arc`
pub(crate) struct MinerContext {
    pub(crate) config: MinerConfig,
    pub(crate) network: NetworkParams,
    pub(crate) policy: MiningPolicy,
    pub(crate) collab: Collaborators,
    pub(crate) gate: SubmissionGate,
    pub(crate) locks: LockLadder<MinerState>,
    pub(crate) mined_on_parents: MinedOnParents,
    pub(crate) siblings: SiblingRegistry,
    pub(crate) stats: SearchCounters,
    pub(crate) entropy: Arc<dyn EntropySource>,
    pub(crate) live_workers: AtomicUsize,
}

impl MinerContext {
    pub(crate) fn new(
        config: &Config,
        collab: Collaborators,
        entropy: Arc<dyn EntropySource>,
    ) -> Self {
        let network = config.network.params();
        let gate = SubmissionGate::new(
            collab.templates.clone(),
            collab.processor.clone(),
            network.reduce_min_difficulty,
        );

        MinerContext {
            config: config.miner.clone(),
            network,
            policy: config.policy,
            collab,
            gate,
            locks: LockLadder::new(MinerState::new(config.miner.worker_threads)),
            mined_on_parents: MinedOnParents::default(),
            siblings: SiblingRegistry::default(),
            stats: SearchCounters::default(),
            entropy,
            live_workers: AtomicUsize::new(0),
        }
    }
}

/// Counts a worker thread as alive for as long as it is held
pub(crate) struct LiveGuard<'a>(&'a AtomicUsize);

impl<'a> LiveGuard<'a> {
    pub(crate) fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        LiveGuard(counter)
    }
}

impl Drop for LiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
