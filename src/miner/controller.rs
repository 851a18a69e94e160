// src/miner/controller.rs
//! Worker pool controller
//!
//! Owns the handles of the running workers and converges their number to
//! the configured count. Resize requests arrive on a channel carrying the
//! new target; shutdown is signalled by the supervisor dropping its sender.

use crate::miner::context::{MinerContext, WorkerId};
use crate::miner::worker::{SearchWorker, WorkerSignals};
use crate::stats::SpeedMonitor;
use crossbeam_channel::{Receiver, Sender, bounded, select, tick};
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Controller-side handle of one worker
struct WorkerHandle {
    id: WorkerId,
    /// Dropping it closes the worker's quit channel
    quit: Sender<()>,
    join: JoinHandle<()>,
}

/// Starts the controller thread
///
/// The controller launches `initial` workers straight away and owns the
/// speed monitor, which it stops only after every worker has been joined.
pub(crate) fn spawn(
    ctx: Arc<MinerContext>,
    monitor: SpeedMonitor,
    initial: usize,
    shutdown: Receiver<()>,
    updates: Receiver<usize>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("miner-controller".into())
        .spawn(move || {
            let controller = PoolController {
                ctx,
                monitor,
                running: Vec::new(),
                retiring: Vec::new(),
                next_id: 0,
            };
            controller.run(initial, shutdown, updates);
        })
}

struct PoolController {
    ctx: Arc<MinerContext>,
    monitor: SpeedMonitor,
    running: Vec<WorkerHandle>,
    retiring: Vec<JoinHandle<()>>,
    next_id: u32,
}

impl PoolController {
    fn run(mut self, initial: usize, shutdown: Receiver<()>, updates: Receiver<usize>) {
        log::trace!("CPU miner controller started");
        self.reconcile(initial);

        loop {
            select! {
                recv(updates) -> msg => match msg {
                    Ok(mut target) => {
                        // Only the latest request matters.
                        while let Ok(next) = updates.try_recv() {
                            target = next;
                        }
                        self.reconcile(target);
                    }
                    Err(_) => break,
                },
                recv(shutdown) -> _ => break,
            }
        }

        self.shutdown();
    }

    /// Retires every worker, joins them all, then stops the monitor
    fn shutdown(mut self) {
        for handle in self.running.drain(..) {
            self.ctx.siblings.unregister(handle.id);
            drop(handle.quit);
            self.retiring.push(handle.join);
        }
        // Workers report to the monitor, so they go first.
        for join in self.retiring.drain(..) {
            join_worker(join);
        }
        self.monitor.stop();

        log::trace!("CPU miner controller done");
    }

    /// Launches or retires workers until `target` are running
    fn reconcile(&mut self, target: usize) {
        let running = self.running.len();
        if target > running {
            for _ in running..target {
                self.launch();
            }
        } else {
            // Most recently created first.
            while self.running.len() > target {
                if let Some(handle) = self.running.pop() {
                    self.ctx.siblings.unregister(handle.id);
                    drop(handle.quit);
                    self.retiring.push(handle.join);
                }
            }
        }
        self.reap();

        if target != running {
            log::debug!("CPU miner workers: {} -> {}", running, self.running.len());
        }
    }

    fn launch(&mut self) {
        let id = WorkerId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);

        let (quit_tx, quit_rx) = bounded::<()>(1);
        let (abandon_tx, abandon_rx) = bounded::<()>(1);
        self.ctx.siblings.register(id, abandon_tx);

        let worker = SearchWorker::new(
            Some(id),
            self.ctx.clone(),
            WorkerSignals {
                quit: quit_rx,
                abandon: abandon_rx,
            },
            self.monitor.reporter(),
            tick(self.ctx.config.update_interval()),
        );

        match thread::Builder::new()
            .name(format!("miner-worker-{}", id))
            .spawn(move || worker.run())
        {
            Ok(join) => self.running.push(WorkerHandle {
                id,
                quit: quit_tx,
                join,
            }),
            Err(e) => {
                log::error!("Failed to spawn CPU miner worker {}: {}", id, e);
                self.ctx.siblings.unregister(id);
            }
        }
    }

    /// Joins retired workers that have already exited
    fn reap(&mut self) {
        let (finished, pending): (Vec<_>, Vec<_>) =
            self.retiring.drain(..).partition(|join| join.is_finished());
        self.retiring = pending;
        for join in finished {
            join_worker(join);
        }
    }
}

fn join_worker(join: JoinHandle<()>) {
    if join.join().is_err() {
        log::error!("CPU miner worker panicked");
    }
}
