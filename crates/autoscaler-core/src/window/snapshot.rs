//! `SnapshotWindow` — retains the most recent value older than a freshness
//! threshold, used for scrape-to-scrape histogram diffing.

use std::collections::VecDeque;

/// Keeps just enough timestamped snapshots that the front is always the
/// most recent entry whose age is at least `fresh_ms`, and discards
/// anything older than `expire_ms` outright.
pub struct SnapshotWindow<T> {
    fresh_ms: i64,
    expire_ms: i64,
    deque: VecDeque<(i64, T)>,
}

impl<T: Clone> SnapshotWindow<T> {
    /// Create a window with the given freshness and hard expiry, both in
    /// milliseconds.
    pub fn new(fresh_ms: i64, expire_ms: i64) -> Self {
        Self {
            fresh_ms,
            expire_ms,
            deque: VecDeque::new(),
        }
    }

    /// Record a new snapshot observed at `now`.
    pub fn append(&mut self, now: i64, value: T) {
        self.deque.push_back((now, value));

        while let Some(&(ts, _)) = self.deque.front() {
            if now - ts > self.expire_ms {
                self.deque.pop_front();
            } else {
                break;
            }
        }

        while self.deque.len() >= 2 {
            let second_ts = self.deque[1].0;
            if now - second_ts >= self.fresh_ms {
                self.deque.pop_front();
            } else {
                break;
            }
        }
    }

    /// The most recent snapshot older than `fresh_ms`, if any.
    pub fn get_last_unfresh_snapshot(&self, now: i64) -> Option<&T> {
        match self.deque.front() {
            Some((ts, value)) if now - ts >= self.fresh_ms => Some(value),
            _ => None,
        }
    }
}
