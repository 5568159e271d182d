use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Ticks kept for `tick_stats`; older ticks are dropped first.
pub const TICK_HISTORY: usize = 1000;

/// Trait for the clocks that drive phase deadlines and the session tick.
pub trait Timer: Clone + Send + Sync {
    type Timestamp: Copy + Clone + Send + Sync;
    fn now(&self) -> Self::Timestamp;
    fn elapsed(&self, ts: Self::Timestamp) -> Duration;
    fn sleep(&self, d: Duration);
    fn record_tick(&mut self, d: Duration);
    fn tick_stats(&self) -> TickStats;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickStats {
    pub samples: usize,
    pub average_tick_ns: f64,
    pub jitter_ns: f64,
    pub min_tick_ns: f64,
    pub max_tick_ns: f64,
    pub effective_rate_hz: f64,
}

impl TickStats {
    pub fn from_durations<'a, I>(ticks: I) -> Self
    where
        I: IntoIterator<Item = &'a Duration>,
    {
        let times: Vec<f64> = ticks.into_iter().map(|d| d.as_nanos() as f64).collect();
        if times.is_empty() {
            return TickStats::default();
        }
        let n = times.len() as f64;
        let avg = times.iter().sum::<f64>() / n;
        let var = times.iter().map(|x| (x - avg).powi(2)).sum::<f64>() / n;
        let min = times.iter().copied().fold(f64::INFINITY, f64::min);
        let max = times.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        TickStats {
            samples: times.len(),
            average_tick_ns: avg,
            jitter_ns: var.sqrt(),
            min_tick_ns: min,
            max_tick_ns: max,
            effective_rate_hz: if avg > 0.0 { 1e9 / avg } else { 0.0 },
        }
    }
}

/// Wall-clock timer backed by the monotonic clock.
#[derive(Debug, Clone)]
pub struct HighPrecisionTimer {
    pub start: Instant,
    pub tick_times: VecDeque<Duration>,
    pub max_samples: usize,
}

impl Timer for HighPrecisionTimer {
    type Timestamp = u64;
    fn now(&self) -> u64 {
        self.start.elapsed().as_nanos() as u64
    }
    fn elapsed(&self, ts: u64) -> Duration {
        Duration::from_nanos(self.now().saturating_sub(ts))
    }
    fn sleep(&self, d: Duration) {
        self.high_precision_sleep(d)
    }
    fn record_tick(&mut self, d: Duration) {
        if self.tick_times.len() >= self.max_samples {
            self.tick_times.pop_front();
        }
        self.tick_times.push_back(d);
    }
    fn tick_stats(&self) -> TickStats {
        TickStats::from_durations(&self.tick_times)
    }
}

impl HighPrecisionTimer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            tick_times: VecDeque::with_capacity(TICK_HISTORY),
            max_samples: TICK_HISTORY,
        }
    }

    pub fn high_precision_sleep(&self, duration: Duration) {
        if duration.is_zero() {
            return;
        }
        #[cfg(target_os = "linux")]
        self.linux_sleep(duration);
        #[cfg(not(target_os = "linux"))]
        std::thread::sleep(duration);
    }

    #[cfg(target_os = "linux")]
    fn linux_sleep(&self, duration: Duration) {
        use libc::{clock_nanosleep, timespec, CLOCK_MONOTONIC, EINTR};

        let mut req = timespec {
            tv_sec: duration.as_secs() as libc::time_t,
            tv_nsec: duration.subsec_nanos() as libc::c_long,
        };
        let mut rem = timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };

        // Relative sleep; resume with the remainder when a signal interrupts.
        loop {
            let ret = unsafe { clock_nanosleep(CLOCK_MONOTONIC, 0, &req, &mut rem) };
            if ret != EINTR {
                break;
            }
            req = rem;
        }
    }
}

impl Default for HighPrecisionTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_of_no_ticks_are_zero() {
        assert_eq!(HighPrecisionTimer::new().tick_stats(), TickStats::default());
    }

    #[test]
    fn stats_summarise_recorded_ticks() {
        let mut timer = HighPrecisionTimer::new();
        timer.record_tick(Duration::from_millis(10));
        timer.record_tick(Duration::from_millis(30));
        let stats = timer.tick_stats();
        assert_eq!(stats.samples, 2);
        assert_eq!(stats.average_tick_ns, 20_000_000.0);
        assert_eq!(stats.jitter_ns, 10_000_000.0);
        assert_eq!(stats.min_tick_ns, 10_000_000.0);
        assert_eq!(stats.max_tick_ns, 30_000_000.0);
        assert!((stats.effective_rate_hz - 50.0).abs() < 1e-9);
    }

    #[test]
    fn tick_history_is_bounded() {
        let mut timer = HighPrecisionTimer::new();
        timer.max_samples = 3;
        for ms in 1..=5 {
            timer.record_tick(Duration::from_millis(ms));
        }
        assert_eq!(timer.tick_times.len(), 3);
        assert_eq!(timer.tick_times.front(), Some(&Duration::from_millis(3)));
    }

    #[test]
    fn sleep_waits_at_least_the_requested_time() {
        let timer = HighPrecisionTimer::new();
        let before = timer.now();
        timer.sleep(Duration::from_millis(2));
        assert!(timer.elapsed(before) >= Duration::from_millis(2));
    }
}
