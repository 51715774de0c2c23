//! `LineChartWindow` — a sliding window where each appended value is
//! considered in effect from its append time until the next append.

use std::collections::VecDeque;

/// Range min/max where each value persists until overwritten rather than
/// only counting at its append instant (contrast with [`super::record::RecordWindow`]).
pub struct LineChartWindow<T, F>
where
    T: Copy,
    F: Fn(T, T) -> bool,
{
    fresh_ms: i64,
    better: F,
    deque: VecDeque<(i64, T)>,
    drift: Option<(i64, T)>,
}

impl<T, F> LineChartWindow<T, F>
where
    T: Copy,
    F: Fn(T, T) -> bool,
{
    /// Create a window with the given freshness (in milliseconds) and
    /// "is strictly better than" comparator. `fresh_ms == 0` disables the
    /// window: it will never report a value.
    pub fn new(fresh_ms: i64, better: F) -> Self {
        Self {
            fresh_ms,
            better,
            deque: VecDeque::new(),
            drift: None,
        }
    }

    /// Append a value that takes effect at `now` and persists until the
    /// next `append` call.
    pub fn append(&mut self, now: i64, value: T) {
        while let Some(&(ts, _)) = self.deque.front() {
            if ts + self.fresh_ms < now {
                self.deque.pop_front();
            } else {
                break;
            }
        }

        if let Some((drift_ts, _)) = self.drift {
            if drift_ts + 2 * self.fresh_ms < now {
                self.drift = None;
            }
        }

        if let Some((drift_ts, drift_val)) = self.drift {
            while let Some(&(_, back_val)) = self.deque.back() {
                if !(self.better)(back_val, drift_val) {
                    self.deque.pop_back();
                } else {
                    break;
                }
            }
            self.deque.push_back((drift_ts, drift_val));
        }

        self.drift = Some((now, value));
    }

    /// The best value currently in effect, starting from `current` and
    /// improving it with the drift slot and the deque's front. `None` only
    /// when the window is disabled (`fresh_ms == 0`).
    pub fn get_best(&self, current: T) -> Option<T> {
        if self.fresh_ms <= 0 {
            return None;
        }
        let mut result = current;
        if let Some((_, drift_val)) = self.drift {
            if (self.better)(drift_val, result) {
                result = drift_val;
            }
        }
        if let Some(&(_, front_val)) = self.deque.front() {
            if (self.better)(front_val, result) {
                result = front_val;
            }
        }
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn min_window(fresh_ms: i64) -> LineChartWindow<i64, impl Fn(i64, i64) -> bool> {
        LineChartWindow::new(fresh_ms, |a: i64, b: i64| a < b)
    }

    #[test]
    fn disabled_window_never_has_a_value() {
        let w = min_window(0);
        assert_eq!(w.get_best(5), None);
    }

    #[test]
    fn value_persists_until_next_append() {
        let mut w = min_window(1000);
        w.append(0, 10);
        // still in effect well before freshMs has elapsed
        assert_eq!(w.get_best(999), Some(10));
        // and still in effect past freshMs, since nothing has replaced it
        assert_eq!(w.get_best(5000), Some(10));
    }

    #[test]
    fn new_append_improves_current() {
        let mut w = min_window(1000);
        w.append(0, 10);
        w.append(100, 20);
        // drift now holds 20; improving current=15 should keep 15 (better
        // for a min-window since 15 < 20), and the old 10 moved into the
        // deque is also a candidate and wins
        assert_eq!(w.get_best(15), Some(10));
    }

    #[test]
    fn drift_expires_after_twice_freshness() {
        let mut w = min_window(1000);
        w.append(0, 10);
        // a second append more than 2*freshMs later drops the stale drift
        // slot before recording the new one
        w.append(2001, 99);
        assert_eq!(w.get_best(1000), Some(99));
    }
}
