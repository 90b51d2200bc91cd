//! Sliding-window latency and traffic accounting
//!
//! Two independent windows: RTT samples over a short horizon (the reported
//! value is the maximum in-window sample) and traffic samples over a longer
//! horizon with running sent/received accumulators. Each window has its own
//! lock so the sweeper, recorders, and readers never contend across windows.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// One round-trip-time observation
#[derive(Debug, Clone, Copy)]
struct RttSample {
    rtt: Duration,
    observed_at: Instant,
}

/// One traffic observation
#[derive(Debug, Clone, Copy)]
struct TrafficSample {
    sent: u64,
    received: u64,
    observed_at: Instant,
}

#[derive(Debug, Default)]
struct TrafficWindow {
    samples: VecDeque<TrafficSample>,
    /// Sum of `sent` over samples currently held in the window
    recent_sent: u64,
    /// Sum of `received` over samples currently held in the window
    recent_received: u64,
    total_sent: u64,
    total_received: u64,
}

/// Point-in-time view of the traffic accumulators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrafficSnapshot {
    pub recent_sent: u64,
    pub recent_received: u64,
    pub total_sent: u64,
    pub total_received: u64,
}

/// Sliding-window tracker for RTT and traffic
pub struct StatsTracker {
    rtt_window: Duration,
    traffic_window: Duration,
    rtts: Mutex<VecDeque<RttSample>>,
    traffic: Mutex<TrafficWindow>,
}

impl StatsTracker {
    /// Create a tracker with the given window horizons
    ///
    /// The RTT window is seeded with a zero sample so `current_rtt` always
    /// has something to report.
    pub fn new(rtt_window: Duration, traffic_window: Duration) -> Self {
        let mut rtts = VecDeque::new();
        rtts.push_back(RttSample {
            rtt: Duration::ZERO,
            observed_at: Instant::now(),
        });

        Self {
            rtt_window,
            traffic_window,
            rtts: Mutex::new(rtts),
            traffic: Mutex::new(TrafficWindow::default()),
        }
    }

    /// Record one completed round trip
    pub fn record_sample(&self, rtt: Duration, sent: u64, received: u64) {
        self.record_sample_at(Instant::now(), rtt, sent, received);
    }

    pub fn record_sample_at(&self, now: Instant, rtt: Duration, sent: u64, received: u64) {
        self.rtts.lock().push_back(RttSample {
            rtt,
            observed_at: now,
        });

        let mut traffic = self.traffic.lock();
        traffic.samples.push_back(TrafficSample {
            sent,
            received,
            observed_at: now,
        });
        traffic.recent_sent += sent;
        traffic.recent_received += received;
        traffic.total_sent += sent;
        traffic.total_received += received;
    }

    /// Maximum RTT among samples newer than the window horizon
    ///
    /// Repeatedly inspects the maximum-valued sample (earliest-inserted wins
    /// ties), discarding it when expired; the last remaining sample is
    /// returned even if stale, so the window never reads as empty.
    pub fn current_rtt(&self) -> Duration {
        self.current_rtt_at(Instant::now())
    }

    pub fn current_rtt_at(&self, now: Instant) -> Duration {
        // Scan and evict under one lock acquisition; another task must not
        // remove the entry between the expiry check and the removal.
        let mut rtts = self.rtts.lock();

        while rtts.len() > 1 {
            let mut max_idx = 0;
            for (idx, sample) in rtts.iter().enumerate() {
                if sample.rtt > rtts[max_idx].rtt {
                    max_idx = idx;
                }
            }

            let max = rtts[max_idx];
            if now.saturating_duration_since(max.observed_at) > self.rtt_window {
                let _ = rtts.remove(max_idx);
                continue;
            }
            return max.rtt;
        }

        rtts.front().map(|s| s.rtt).unwrap_or_default()
    }

    /// Evict at most one expired sample per window
    ///
    /// Called once per sweeper tick; the RTT window keeps its last sample
    /// even when expired.
    pub fn sweep(&self) {
        self.sweep_at(Instant::now());
    }

    pub fn sweep_at(&self, now: Instant) {
        {
            let mut rtts = self.rtts.lock();
            if rtts.len() > 1 {
                if let Some(front) = rtts.front().copied() {
                    if now.saturating_duration_since(front.observed_at) > self.rtt_window {
                        let _ = rtts.pop_front();
                    }
                }
            }
        }

        let mut traffic = self.traffic.lock();
        if let Some(front) = traffic.samples.front().copied() {
            if now.saturating_duration_since(front.observed_at) > self.traffic_window {
                let _ = traffic.samples.pop_front();
                traffic.recent_sent -= front.sent;
                traffic.recent_received -= front.received;
            }
        }
    }

    /// Current accumulator values
    pub fn traffic_snapshot(&self) -> TrafficSnapshot {
        let traffic = self.traffic.lock();
        TrafficSnapshot {
            recent_sent: traffic.recent_sent,
            recent_received: traffic.recent_received,
            total_sent: traffic.total_sent,
            total_received: traffic.total_received,
        }
    }

    #[cfg(test)]
    fn rtt_sample_count(&self) -> usize {
        self.rtts.lock().len()
    }

    #[cfg(test)]
    fn traffic_window_sum(&self) -> (u64, u64) {
        let traffic = self.traffic.lock();
        traffic
            .samples
            .iter()
            .fold((0, 0), |(s, r), sample| (s + sample.sent, r + sample.received))
    }
}
