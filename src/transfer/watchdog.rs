//! Rolling throughput measurement and the stall rule built on it.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::error::TransferError;

/// Bytes observed over a sliding time window
#[derive(Debug)]
pub(crate) struct RateMeter {
    window: Duration,
    started: Instant,
    samples: VecDeque<(Instant, u64)>,
    in_window: u64,
}

impl RateMeter {
    pub(crate) fn new(window: Duration, started: Instant) -> Self {
        Self {
            window,
            started,
            samples: VecDeque::new(),
            in_window: 0,
        }
    }

    pub(crate) fn record(&mut self, bytes: u64, at: Instant) {
        self.samples.push_back((at, bytes));
        self.in_window += bytes;
        self.evict(at);
    }

    /// Bytes per second over the last `window`, or since start if younger
    pub(crate) fn rate_bps(&mut self, now: Instant) -> u64 {
        self.evict(now);
        let span = now.saturating_duration_since(self.started).min(self.window);
        if span.is_zero() {
            return 0;
        }
        (self.in_window as f64 / span.as_secs_f64()) as u64
    }

    fn evict(&mut self, now: Instant) {
        while let Some(&(at, bytes)) = self.samples.front() {
            if now.saturating_duration_since(at) <= self.window {
                break;
            }
            self.samples.pop_front();
            self.in_window -= bytes;
        }
    }
}

/// Aborts a transfer whose rolling rate stays under `min_bps` past `grace`
#[derive(Debug)]
pub(crate) struct StallWatchdog {
    started: Instant,
    grace: Duration,
    min_bps: u64,
    meter: RateMeter,
}

impl StallWatchdog {
    pub(crate) fn new(grace: Duration, min_bps: u64, window: Duration, started: Instant) -> Self {
        Self {
            started,
            grace,
            min_bps,
            meter: RateMeter::new(window, started),
        }
    }

    pub(crate) fn record(&mut self, bytes: u64, at: Instant) {
        self.meter.record(bytes, at);
    }

    /// `Err(Stall)` once the grace period is over and the rate is too low
    pub(crate) fn check(&mut self, now: Instant) -> Result<(), TransferError> {
        let elapsed = now.saturating_duration_since(self.started);
        if elapsed < self.grace || self.min_bps == 0 {
            return Ok(());
        }

        let rate_bps = self.meter.rate_bps(now);
        tracing::trace!(rate_bps, elapsed_ms = elapsed.as_millis() as u64, "Watchdog sample");
        if rate_bps < self.min_bps {
            return Err(TransferError::Stall {
                rate_bps,
                min_bps: self.min_bps,
                elapsed,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: u64 = 1024 * 1024;

    #[test]
    fn rate_uses_elapsed_time_before_window_fills() {
        let t0 = Instant::now();
        let mut meter = RateMeter::new(Duration::from_secs(10), t0);
        meter.record(4 * MIB, t0 + Duration::from_secs(1));
        assert_eq!(meter.rate_bps(t0 + Duration::from_secs(2)), 2 * MIB);
    }

    #[test]
    fn old_samples_fall_out_of_window() {
        let t0 = Instant::now();
        let mut meter = RateMeter::new(Duration::from_secs(5), t0);
        meter.record(100 * MIB, t0 + Duration::from_secs(1));
        meter.record(5 * MIB, t0 + Duration::from_secs(9));

        // Only the 5 MiB sample is inside [5s, 10s]
        assert_eq!(meter.rate_bps(t0 + Duration::from_secs(10)), MIB);
    }

    #[test]
    fn zero_span_reports_zero() {
        let t0 = Instant::now();
        let mut meter = RateMeter::new(Duration::from_secs(5), t0);
        assert_eq!(meter.rate_bps(t0), 0);
    }

    #[test]
    fn watchdog_is_silent_during_grace() {
        let t0 = Instant::now();
        let mut dog = StallWatchdog::new(Duration::from_secs(15), 2 * MIB, Duration::from_secs(5), t0);
        assert!(dog.check(t0 + Duration::from_secs(14)).is_ok());
    }

    #[test]
    fn watchdog_trips_after_grace_when_slow() {
        let t0 = Instant::now();
        let mut dog = StallWatchdog::new(Duration::from_secs(15), 2 * MIB, Duration::from_secs(5), t0);
        for s in 0..16 {
            dog.record(MIB / 4, t0 + Duration::from_secs(s));
        }

        match dog.check(t0 + Duration::from_secs(16)) {
            Err(TransferError::Stall {
                rate_bps, min_bps, ..
            }) => {
                assert!(rate_bps < min_bps);
                assert_eq!(min_bps, 2 * MIB);
            }
            other => panic!("expected stall, got {other:?}"),
        }
    }

    #[test]
    fn watchdog_passes_fast_transfer() {
        let t0 = Instant::now();
        let mut dog = StallWatchdog::new(Duration::from_secs(15), 2 * MIB, Duration::from_secs(5), t0);
        for s in 0..=20 {
            dog.record(10 * MIB, t0 + Duration::from_secs(s));
        }
        assert!(dog.check(t0 + Duration::from_secs(20)).is_ok());
    }

    #[test]
    fn watchdog_trips_on_silence_after_fast_start() {
        let t0 = Instant::now();
        let mut dog = StallWatchdog::new(Duration::from_secs(15), 2 * MIB, Duration::from_secs(5), t0);
        for s in 0..10 {
            dog.record(50 * MIB, t0 + Duration::from_secs(s));
        }
        // Nothing for the last 6 seconds: the window is empty
        assert!(dog.check(t0 + Duration::from_secs(16)).is_err());
    }

    #[test]
    fn zero_minimum_disables_watchdog() {
        let t0 = Instant::now();
        let mut dog = StallWatchdog::new(Duration::ZERO, 0, Duration::from_secs(5), t0);
        assert!(dog.check(t0 + Duration::from_secs(60)).is_ok());
    }
}
