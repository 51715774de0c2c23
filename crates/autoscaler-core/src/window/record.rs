//! `RecordWindow` — a monotone deque supporting range min/max over a
//! freshness-bounded sliding window.

use std::collections::VecDeque;

/// Range min/max over the last `fresh_ms` milliseconds.
///
/// `better(a, b)` must report whether `a` should be preferred over `b` when
/// both are candidates for "best" (e.g. `a > b` for a max-window, `a < b`
/// for a min-window). It must be a strict, irreflexive relation:
/// `better(x, x)` is always `false`.
pub struct RecordWindow<T, F>
where
    T: Copy,
    F: Fn(T, T) -> bool,
{
    fresh_ms: i64,
    better: F,
    deque: VecDeque<(i64, T)>,
}

impl<T, F> RecordWindow<T, F>
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
        }
    }

    fn expire_front(&mut self, now: i64) {
        while let Some(&(ts, _)) = self.deque.front() {
            if ts + self.fresh_ms < now {
                self.deque.pop_front();
            } else {
                break;
            }
        }
    }

    /// Append a freshly observed value at time `now`.
    pub fn append(&mut self, now: i64, value: T) {
        self.expire_front(now);
        while let Some(&(_, back_val)) = self.deque.back() {
            if !(self.better)(back_val, value) {
                self.deque.pop_back();
            } else {
                break;
            }
        }
        self.deque.push_back((now, value));
    }

    /// The current best (fresh) value, or `None` if the window is empty,
    /// disabled, or every sample has expired by `now`.
    pub fn get_best(&mut self, now: i64) -> Option<T> {
        if self.fresh_ms <= 0 {
            return None;
        }
        self.expire_front(now);
        self.deque.front().map(|&(_, v)| v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn max_window(fresh_ms: i64) -> RecordWindow<i64, impl Fn(i64, i64) -> bool> {
        RecordWindow::new(fresh_ms, |a: i64, b: i64| a > b)
    }

    fn min_window(fresh_ms: i64) -> RecordWindow<i64, impl Fn(i64, i64) -> bool> {
        RecordWindow::new(fresh_ms, |a: i64, b: i64| a < b)
    }

    #[test]
    fn disabled_window_never_has_a_value() {
        let mut w = max_window(0);
        w.append(0, 5);
        assert_eq!(w.get_best(0), None);
    }

    #[test]
    fn empty_window_has_no_value() {
        let mut w = max_window(1000);
        assert_eq!(w.get_best(0), None);
    }

    #[test]
    fn max_window_tracks_range_max() {
        let mut w = max_window(1000);
        w.append(0, 3);
        w.append(100, 1);
        w.append(200, 5);
        w.append(300, 2);
        // 5 is the max among fresh samples
        assert_eq!(w.get_best(300), Some(5));
    }

    #[test]
    fn min_window_tracks_range_min() {
        let mut w = min_window(1000);
        w.append(0, 3);
        w.append(100, 5);
        w.append(200, 1);
        w.append(300, 4);
        assert_eq!(w.get_best(300), Some(1));
    }

    #[test]
    fn freshness_boundary_inclusive_then_exclusive() {
        let mut w = max_window(1000);
        w.append(0, 7);
        // at exactly t + freshMs the sample is still valid
        assert_eq!(w.get_best(1000), Some(7));
        // past freshMs it must be gone
        assert_eq!(w.get_best(1001), None);
    }

    #[test]
    fn ties_keep_the_older_sample_at_front() {
        let mut w = max_window(1000);
        w.append(0, 5);
        w.append(100, 5);
        // pop-back only removes values that are NOT strictly better than
        // the incoming one; an equal incoming value does not evict the
        // existing front, so querying immediately still returns the first.
        assert_eq!(w.get_best(100), Some(5));
    }

    #[test]
    fn monotone_pop_back_discards_dominated_values() {
        let mut w = max_window(1000);
        w.append(0, 1);
        w.append(10, 2);
        w.append(20, 3);
        // 1 and 2 are dominated by 3 and should have been popped from the
        // back; only 3 remains, so it stays the max even once 3 itself
        // ages out relative to a later, smaller value.
        assert_eq!(w.get_best(20), Some(3));
        w.append(900, 0);
        assert_eq!(w.get_best(900), Some(3));
    }
}
