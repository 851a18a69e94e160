// src/stats/monitor.rs
use arc_swap::ArcSwap;
use crossbeam_channel::{Receiver, Sender, select, tick, unbounded};
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// How far back hash reports count towards the rate
pub const RATE_WINDOW: Duration = Duration::from_secs(60 * 60);

/// Last hash rate computed by the monitor
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RateSnapshot {
    /// Hashes per second over the trailing window
    pub hashes_per_second: f64,
    /// Hashes reported since the monitor started
    pub total_hashes: u64,
}

/// Lock-free read side of the monitor's rate
#[derive(Debug, Clone)]
pub struct RateHandle(Arc<ArcSwap<RateSnapshot>>);

impl RateHandle {
    /// Hashes per second as of the last tick
    pub fn hashes_per_second(&self) -> f64 {
        self.0.load().hashes_per_second
    }

    /// The whole snapshot as of the last tick
    pub fn snapshot(&self) -> RateSnapshot {
        **self.0.load()
    }
}

/// Write side used by workers to report completed hashes
#[derive(Debug, Clone)]
pub struct HashReporter(Sender<u64>);

impl HashReporter {
    /// Reports `hashes` completed since the previous report
    ///
    /// Returns `false` when the monitor has already stopped and the report
    /// was lost.
    pub fn report(&self, hashes: u64) -> bool {
        hashes == 0 || self.0.send(hashes).is_ok()
    }
}

/// Trailing window of hash reports
///
/// Reports are kept with their arrival time and dropped once older than
/// [`RATE_WINDOW`]. Until the monitor has been running for a full window
/// the rate is averaged over the time it has been running.
#[derive(Debug)]
pub struct RateWindow {
    samples: VecDeque<(Instant, u64)>,
    in_window: u64,
    total: u64,
    ticks: u32,
    interval: Duration,
}

impl RateWindow {
    /// Creates an empty window recomputed every `interval`
    pub fn new(interval: Duration) -> Self {
        RateWindow {
            samples: VecDeque::new(),
            in_window: 0,
            total: 0,
            ticks: 0,
            interval,
        }
    }

    /// Adds a report
    pub fn record(&mut self, at: Instant, hashes: u64) {
        self.samples.push_back((at, hashes));
        self.in_window += hashes;
        self.total += hashes;
    }

    /// Expires old reports and returns the new rate
    pub fn recompute(&mut self, now: Instant) -> f64 {
        while let Some(&(at, hashes)) = self.samples.front() {
            if now.saturating_duration_since(at) <= RATE_WINDOW {
                break;
            }
            self.in_window -= hashes;
            self.samples.pop_front();
        }

        self.ticks = self.ticks.saturating_add(1);
        let running_for = self.interval.saturating_mul(self.ticks).min(RATE_WINDOW);
        self.in_window as f64 / running_for.as_secs_f64()
    }

    /// Hashes reported since creation
    pub fn total(&self) -> u64 {
        self.total
    }
}

/// Tracks how many hashes per second the pool is performing
///
/// Runs on its own thread. Workers push counts through a [`HashReporter`];
/// the rate is recomputed on every tick and published to a [`RateHandle`].
pub struct SpeedMonitor {
    reports: Sender<u64>,
    quit: Option<Sender<()>>,
    rate: RateHandle,
    handle: Option<JoinHandle<()>>,
}

impl SpeedMonitor {
    /// Starts the monitor thread
    ///
    /// # Arguments
    /// * `interval` - How often the rate is recomputed
    pub fn spawn(interval: Duration) -> io::Result<Self> {
        let (reports_tx, reports_rx) = unbounded();
        let (quit_tx, quit_rx) = crossbeam_channel::bounded::<()>(1);
        let rate = RateHandle(Arc::new(ArcSwap::from_pointee(RateSnapshot::default())));

        let published = rate.clone();
        let handle = thread::Builder::new()
            .name("speed-monitor".into())
            .spawn(move || monitor_loop(interval, reports_rx, quit_rx, published))?;

        Ok(SpeedMonitor {
            reports: reports_tx,
            quit: Some(quit_tx),
            rate,
            handle: Some(handle),
        })
    }

    /// A reporter for one worker
    pub fn reporter(&self) -> HashReporter {
        HashReporter(self.reports.clone())
    }

    /// Read handle for the rate
    pub fn rate_handle(&self) -> RateHandle {
        self.rate.clone()
    }

    /// Hashes per second as of the last tick
    pub fn hashes_per_second(&self) -> f64 {
        self.rate.hashes_per_second()
    }

    /// Stops the monitor and waits for its thread
    pub fn stop(mut self) {
        self.quit.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("speed monitor thread panicked");
            }
        }
    }
}

impl Drop for SpeedMonitor {
    fn drop(&mut self) {
        // Closing the quit channel is enough to end the loop.
        self.quit.take();
    }
}

fn monitor_loop(
    interval: Duration,
    reports: Receiver<u64>,
    quit: Receiver<()>,
    rate: RateHandle,
) {
    log::trace!("CPU miner speed monitor started");

    let ticker = tick(interval);
    let mut window = RateWindow::new(interval);

    loop {
        select! {
            recv(reports) -> msg => match msg {
                Ok(hashes) => window.record(Instant::now(), hashes),
                Err(_) => break,
            },
            recv(ticker) -> _ => {
                let hashes_per_second = window.recompute(Instant::now());
                rate.0.store(Arc::new(RateSnapshot {
                    hashes_per_second,
                    total_hashes: window.total(),
                }));
                if hashes_per_second != 0.0 {
                    log::info!(
                        "Hash speed: {:.2} hashes/hour, hashes completed: {}",
                        hashes_per_second * 3600.0,
                        window.total()
                    );
                }
            },
            recv(quit) -> _ => break,
        }
    }

    log::trace!("CPU miner speed monitor done");
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn rate_is_hashes_over_elapsed_ticks() {
        let start = Instant::now();
        let mut window = RateWindow::new(Duration::from_secs(10));
        window.record(start, 500);
        window.record(start, 500);
        assert_eq!(window.recompute(start + Duration::from_secs(10)), 100.0);
        // Second tick, nothing new: same hashes over twice the time.
        assert_eq!(window.recompute(start + Duration::from_secs(20)), 50.0);
        assert_eq!(window.total(), 1000);
    }

    #[test]
    fn reports_older_than_window_expire() {
        let start = Instant::now();
        let mut window = RateWindow::new(Duration::from_secs(60 * 30));
        window.record(start, 3600);
        window.recompute(start + Duration::from_secs(60 * 30));
        let rate = window.recompute(start + RATE_WINDOW + Duration::from_secs(1));
        assert_eq!(rate, 0.0);
        assert_eq!(window.total(), 3600);
    }

    proptest! {
        #[test]
        fn first_tick_rate_matches_reports(counts in proptest::collection::vec(1u64..10_000, 1..50)) {
            let start = Instant::now();
            let mut window = RateWindow::new(Duration::from_secs(5));
            for c in &counts {
                window.record(start, *c);
            }
            let expected = counts.iter().sum::<u64>() as f64 / 5.0;
            let rate = window.recompute(start + Duration::from_secs(5));
            prop_assert!((rate - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn monitor_publishes_rate_on_tick() {
        let monitor = SpeedMonitor::spawn(Duration::from_millis(300)).unwrap();
        assert_eq!(monitor.hashes_per_second(), 0.0);

        let reporter = monitor.reporter();
        for _ in 0..30 {
            reporter.report(10);
        }

        let deadline = Instant::now() + Duration::from_secs(5);
        while monitor.rate_handle().snapshot().total_hashes == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(20));
        }
        let rate = monitor.hashes_per_second();
        // 300 hashes over one 300ms tick.
        assert!((rate - 1000.0).abs() < 1.0, "rate was {}", rate);
        monitor.stop();
    }

    #[test]
    fn reports_after_stop_are_refused() {
        let monitor = SpeedMonitor::spawn(Duration::from_secs(60)).unwrap();
        let reporter = monitor.reporter();
        assert!(reporter.report(5));

        monitor.stop();
        assert!(!reporter.report(5));
        // Nothing to deliver, nothing lost.
        assert!(reporter.report(0));
    }
}
