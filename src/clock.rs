//! Monotonic time source, injectable for deterministic replay.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// A source of `ts_arrival` timestamps for admitted orders and events.
///
/// `ts_arrival` is informational only — ordering always uses `arrival_seq`
/// (§3) — but replaying a recorded event log with the same `Clock`
/// implementation must reproduce the same timestamps (§6), so production
/// code uses [`SystemClock`] while tests and replay use [`ManualClock`].
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch, or any monotonically
    /// non-decreasing counter a test harness chooses to supply.
    fn now_millis(&self) -> u64;
}

/// Wall-clock time via `SystemTime`. The default for live engines.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// A clock driven by an explicit counter, for deterministic tests and replay.
#[derive(Debug, Default)]
pub struct ManualClock {
    ticks: AtomicU64,
}

impl ManualClock {
    /// Creates a manual clock starting at `start`.
    #[must_use]
    pub fn new(start: u64) -> Self {
        Self {
            ticks: AtomicU64::new(start),
        }
    }

    /// Advances the clock by `delta` and returns the new value.
    pub fn advance(&self, delta: u64) -> u64 {
        self.ticks.fetch_add(delta, Ordering::Relaxed) + delta
    }

    /// Sets the clock to an explicit value.
    pub fn set(&self, value: u64) {
        self.ticks.store(value, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }
}

/// Convenience alias for the shared-ownership form engines hold onto.
pub type SharedClock = Arc<dyn Clock>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(100);
        assert_eq!(clock.now_millis(), 100);
        assert_eq!(clock.advance(50), 150);
        assert_eq!(clock.now_millis(), 150);
    }

    #[test]
    fn manual_clock_set_is_absolute() {
        let clock = ManualClock::new(0);
        clock.set(999);
        assert_eq!(clock.now_millis(), 999);
    }
}
