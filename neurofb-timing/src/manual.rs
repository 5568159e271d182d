use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::timer::{TickStats, Timer, TICK_HISTORY};

/// Virtual clock for deterministic runs.
///
/// Clones share the same clock. `sleep` returns immediately after moving the
/// clock forward, so a whole session can be replayed without wall-clock
/// delay.
#[derive(Debug, Clone, Default)]
pub struct ManualTimer {
    now_ns: Arc<AtomicU64>,
    tick_times: VecDeque<Duration>,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, d: Duration) {
        self.now_ns.fetch_add(d.as_nanos() as u64, Ordering::SeqCst);
    }

    pub fn set(&self, ns: u64) {
        self.now_ns.store(ns, Ordering::SeqCst);
    }
}

impl Timer for ManualTimer {
    type Timestamp = u64;
    fn now(&self) -> u64 {
        self.now_ns.load(Ordering::SeqCst)
    }
    fn elapsed(&self, ts: u64) -> Duration {
        Duration::from_nanos(self.now().saturating_sub(ts))
    }
    fn sleep(&self, d: Duration) {
        self.advance(d);
    }
    fn record_tick(&mut self, d: Duration) {
        if self.tick_times.len() >= TICK_HISTORY {
            self.tick_times.pop_front();
        }
        self.tick_times.push_back(d);
    }
    fn tick_stats(&self) -> TickStats {
        TickStats::from_durations(&self.tick_times)
    }
}
