//! Continuous-failure circuit breaker
//!
//! Gates admission once consecutive failures exceed a threshold. The gate
//! re-opens purely by time elapsing past the block window (time-based
//! half-open): interim successes reset the streak, but an already tripped
//! breaker heals only by waiting. This is explicit policy, not an accident.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

#[derive(Debug, Default, Clone, Copy)]
struct FailureState {
    continuous_fail_count: u32,
    last_failure_at: Option<Instant>,
}

/// Point-in-time view of the breaker counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSnapshot {
    pub continuous_fail_count: u32,
    pub success_count: u64,
    pub failure_count: u64,
}

/// Admission-control gate over consecutive request failures
pub struct FailureBreaker {
    continuous_fail_limit: u32,
    block_window: Duration,
    state: Mutex<FailureState>,
    success_count: AtomicU64,
    failure_count: AtomicU64,
}

impl FailureBreaker {
    pub fn new(continuous_fail_limit: u32, block_window: Duration) -> Self {
        Self {
            continuous_fail_limit,
            block_window,
            state: Mutex::new(FailureState::default()),
            success_count: AtomicU64::new(0),
            failure_count: AtomicU64::new(0),
        }
    }

    /// Record a successful round trip; resets the failure streak
    pub fn on_success(&self) {
        self.state.lock().continuous_fail_count = 0;
        self.success_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed round trip
    pub fn on_failure(&self) {
        self.on_failure_at(Instant::now());
    }

    pub fn on_failure_at(&self, now: Instant) {
        let mut state = self.state.lock();
        state.continuous_fail_count = state.continuous_fail_count.saturating_add(1);
        state.last_failure_at = Some(now);
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Whether new requests should be admitted
    ///
    /// Denied only while the failure streak exceeds the limit and the last
    /// failure is still inside the block window.
    pub fn admit(&self) -> bool {
        self.admit_at(Instant::now())
    }

    pub fn admit_at(&self, now: Instant) -> bool {
        let state = self.state.lock();
        match state.last_failure_at {
            Some(last) => {
                let blocked = now.saturating_duration_since(last) < self.block_window
                    && state.continuous_fail_count > self.continuous_fail_limit;
                !blocked
            }
            None => true,
        }
    }

    /// Current counter values
    pub fn snapshot(&self) -> BreakerSnapshot {
        let state = self.state.lock();
        BreakerSnapshot {
            continuous_fail_count: state.continuous_fail_count,
            success_count: self.success_count.load(Ordering::Relaxed),
            failure_count: self.failure_count.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(limit: u32, block_secs: u64) -> FailureBreaker {
        FailureBreaker::new(limit, Duration::from_secs(block_secs))
    }

    #[test]
    fn test_admits_with_no_history() {
        let b = breaker(3, 60);
        assert!(b.admit_at(Instant::now()));
    }

    #[test]
    fn test_trips_after_limit_exceeded() {
        let b = breaker(3, 60);
        let t0 = Instant::now();

        // At the limit the breaker still admits; only strictly more than
        // `continuous_fail_limit` failures trip it.
        for _ in 0..3 {
            b.on_failure_at(t0);
        }
        assert!(b.admit_at(t0 + Duration::from_secs(1)));

        b.on_failure_at(t0);
        assert!(!b.admit_at(t0 + Duration::from_secs(1)));
    }

    #[test]
    fn test_blocks_for_window_then_self_heals() {
        let b = breaker(2, 60);
        let t0 = Instant::now();

        for _ in 0..5 {
            b.on_failure_at(t0);
        }

        // Denied anywhere inside the window.
        assert!(!b.admit_at(t0 + Duration::from_secs(1)));
        assert!(!b.admit_at(t0 + Duration::from_secs(59)));

        // Re-admitted once the window has fully elapsed, with no success
        // required and the streak still over the limit.
        assert!(b.admit_at(t0 + Duration::from_secs(60)));
        assert!(b.admit_at(t0 + Duration::from_secs(600)));
    }

    #[test]
    fn test_success_resets_streak_immediately() {
        let b = breaker(2, 60);
        let t0 = Instant::now();

        for _ in 0..5 {
            b.on_failure_at(t0);
        }
        assert!(!b.admit_at(t0 + Duration::from_secs(1)));

        b.on_success();
        assert!(b.admit_at(t0 + Duration::from_secs(1)));
    }

    #[test]
    fn test_new_failure_inside_window_extends_block() {
        let b = breaker(1, 60);
        let t0 = Instant::now();

        b.on_failure_at(t0);
        b.on_failure_at(t0 + Duration::from_secs(30));

        // The block window is measured from the most recent failure.
        assert!(!b.admit_at(t0 + Duration::from_secs(70)));
        assert!(b.admit_at(t0 + Duration::from_secs(90)));
    }

    #[test]
    fn test_snapshot_counters() {
        let b = breaker(3, 60);
        let t0 = Instant::now();

        b.on_failure_at(t0);
        b.on_failure_at(t0);
        b.on_success();
        b.on_failure_at(t0);

        let snapshot = b.snapshot();
        assert_eq!(snapshot.failure_count, 3);
        assert_eq!(snapshot.success_count, 1);
        assert_eq!(snapshot.continuous_fail_count, 1);
    }
}
