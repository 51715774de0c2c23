//! Injectable time source.
//!
//! The sliding windows and panic-mode timing in this crate never read
//! wall-clock time directly; they take a `&dyn Clock` so tests can drive
//! time deterministically instead of sleeping.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// A monotonic millisecond time source.
pub trait Clock: Send + Sync {
    /// Current time in milliseconds since an arbitrary epoch. Only
    /// differences between calls are meaningful.
    fn now_millis(&self) -> i64;
}

/// Real wall-clock time, measured from the Unix epoch.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before Unix epoch")
            .as_millis() as i64
    }
}

/// A settable clock for deterministic tests.
#[derive(Debug, Clone)]
pub struct FakeClock {
    millis: Arc<AtomicU64>,
}

impl FakeClock {
    /// Create a fake clock starting at `start_millis`.
    pub fn new(start_millis: i64) -> Self {
        Self {
            millis: Arc::new(AtomicU64::new(start_millis as u64)),
        }
    }

    /// Advance the clock by `delta_millis`.
    pub fn advance(&self, delta_millis: i64) {
        self.millis
            .fetch_add(delta_millis as u64, Ordering::SeqCst);
    }

    /// Set the clock to an absolute value.
    pub fn set(&self, millis: i64) {
        self.millis.store(millis as u64, Ordering::SeqCst);
    }
}

impl Clock for FakeClock {
    fn now_millis(&self) -> i64 {
        self.millis.load(Ordering::SeqCst) as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_clock_advances() {
        let clock = FakeClock::new(1000);
        assert_eq!(clock.now_millis(), 1000);
        clock.advance(500);
        assert_eq!(clock.now_millis(), 1500);
        clock.set(42);
        assert_eq!(clock.now_millis(), 42);
    }
}
