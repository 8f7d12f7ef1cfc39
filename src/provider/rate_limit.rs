// =============================================================================
// Request Budget Tracker -- keeps us under the provider's per-minute quota
// =============================================================================
//
// The free tier of the intraday provider allows only a handful of calls per
// minute; exceeding it returns a "Note" payload instead of data. We count our
// own requests in a fixed one-minute window and refuse to send once the
// budget is spent, so the orchestrator can fall back without a round trip.
// =============================================================================

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, warn};

/// Length of one budget window.
const WINDOW: Duration = Duration::from_secs(60);

/// Thread-safe request budget for a one-minute window.
pub struct RateLimitTracker {
    max_per_minute: u32,
    used_1m: AtomicU32,
    window_started: Mutex<Instant>,
}

/// Immutable snapshot of the current budget (for the status endpoint).
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitSnapshot {
    pub used_1m: u32,
    pub max_per_minute: u32,
}

impl RateLimitTracker {
    /// Create a tracker allowing `max_per_minute` requests (at least one).
    pub fn new(max_per_minute: u32) -> Self {
        Self {
            max_per_minute: max_per_minute.max(1),
            used_1m: AtomicU32::new(0),
            window_started: Mutex::new(Instant::now()),
        }
    }

    /// Reserve one request slot. Returns `false` when the window's budget is
    /// already spent.
    pub fn try_acquire(&self) -> bool {
        self.try_acquire_at(Instant::now())
    }

    fn try_acquire_at(&self, now: Instant) -> bool {
        let mut started = self.window_started.lock();
        if now.saturating_duration_since(*started) >= WINDOW {
            *started = now;
            self.used_1m.store(0, Ordering::Relaxed);
            debug!("request budget window reset");
        }

        let used = self.used_1m.load(Ordering::Relaxed);
        if used >= self.max_per_minute {
            warn!(
                used,
                limit = self.max_per_minute,
                "request blocked -- per-minute provider budget spent"
            );
            return false;
        }
        self.used_1m.store(used + 1, Ordering::Relaxed);
        true
    }

    /// Produce a serialisable snapshot of the current counters.
    pub fn snapshot(&self) -> RateLimitSnapshot {
        RateLimitSnapshot {
            used_1m: self.used_1m.load(Ordering::Relaxed),
            max_per_minute: self.max_per_minute,
        }
    }
}

impl std::fmt::Debug for RateLimitTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitTracker")
            .field("used_1m", &self.used_1m.load(Ordering::Relaxed))
            .field("max_per_minute", &self.max_per_minute)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_when_budget_spent() {
        let tracker = RateLimitTracker::new(2);
        let now = Instant::now();
        assert!(tracker.try_acquire_at(now));
        assert!(tracker.try_acquire_at(now));
        assert!(!tracker.try_acquire_at(now));
        assert_eq!(tracker.snapshot().used_1m, 2);
    }

    #[test]
    fn window_rolls_over() {
        let tracker = RateLimitTracker::new(1);
        let now = Instant::now();
        assert!(tracker.try_acquire_at(now));
        assert!(!tracker.try_acquire_at(now + Duration::from_secs(30)));
        assert!(tracker.try_acquire_at(now + Duration::from_secs(61)));
        assert_eq!(tracker.snapshot().used_1m, 1);
    }

    #[test]
    fn zero_limit_is_clamped_to_one() {
        let tracker = RateLimitTracker::new(0);
        assert_eq!(tracker.snapshot().max_per_minute, 1);
        assert!(tracker.try_acquire());
    }
}
