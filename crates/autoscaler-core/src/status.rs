//! Per-binding status: panic-mode timing plus the five history windows that
//! feed the correction algorithm.

use crate::types::Behavior;
use crate::window::{LineChartWindow, RecordWindow};

fn gt(a: i64, b: i64) -> bool {
    a > b
}

fn lt(a: i64, b: i64) -> bool {
    a < b
}

/// The five sliding windows a [`Status`] owns. Polarity matters:
/// `max_corrected` is a *minimum*-line-chart window, as are both
/// `min_corrected_for_*` windows. Preserving this polarity is what makes
/// the correction caps behave as floors/ceilings rather than inverting
/// the rate limits.
pub struct History {
    /// Largest recent recommendation (freshness = scale-down stabilization).
    pub max_recommendation: RecordWindow<i64, fn(i64, i64) -> bool>,
    /// Smallest recent recommendation (freshness = scale-up stabilization).
    pub min_recommendation: RecordWindow<i64, fn(i64, i64) -> bool>,
    /// Floor on scale-down, tracked as a minimum line-chart window
    /// (freshness = scale-down period).
    pub max_corrected: LineChartWindow<i64, fn(i64, i64) -> bool>,
    /// Ceiling on stable scale-up (freshness = scale-up stable period).
    pub min_corrected_for_stable: LineChartWindow<i64, fn(i64, i64) -> bool>,
    /// Ceiling on panic scale-up (freshness = scale-up panic period).
    pub min_corrected_for_panic: LineChartWindow<i64, fn(i64, i64) -> bool>,
}

impl History {
    /// Build the five windows from a binding's behavior policy.
    pub fn new(behavior: &Behavior) -> Self {
        Self {
            max_recommendation: RecordWindow::new(
                behavior.scale_down.stabilization_window_ms,
                gt as fn(i64, i64) -> bool,
            ),
            min_recommendation: RecordWindow::new(
                behavior.scale_up.stable_policy.stabilization_window_ms,
                lt as fn(i64, i64) -> bool,
            ),
            max_corrected: LineChartWindow::new(
                behavior.scale_down.period_ms,
                lt as fn(i64, i64) -> bool,
            ),
            min_corrected_for_stable: LineChartWindow::new(
                behavior.scale_up.stable_policy.period_ms,
                lt as fn(i64, i64) -> bool,
            ),
            min_corrected_for_panic: LineChartWindow::new(
                behavior.scale_up.panic_policy.period_ms,
                lt as fn(i64, i64) -> bool,
            ),
        }
    }

    /// Append a freshly computed `(recommended, corrected)` pair at `now`:
    /// recommended feeds the two record windows, corrected feeds all three
    /// line-chart windows.
    pub fn append(&mut self, now: i64, recommended: i64, corrected: i64) {
        self.max_recommendation.append(now, recommended);
        self.min_recommendation.append(now, recommended);
        self.max_corrected.append(now, corrected);
        self.min_corrected_for_stable.append(now, corrected);
        self.min_corrected_for_panic.append(now, corrected);
    }
}

/// Panic-mode timing plus the binding's history windows.
pub struct Status {
    /// Monotonic-millis timestamp at which panic mode ends; `0` if never
    /// (re-)triggered or if panic is disabled via `panic_mode_hold_ms == 0`.
    pub panic_mode_ends_at: i64,
    /// How long panic mode is held once (re-)triggered, in milliseconds.
    pub panic_mode_hold_ms: i64,
    /// The five history windows (see [`History`]).
    pub history: History,
}

impl Status {
    /// Build a fresh status for a binding from its behavior policy.
    pub fn new(behavior: &Behavior) -> Self {
        Self {
            panic_mode_ends_at: 0,
            panic_mode_hold_ms: behavior.scale_up.panic_policy.hold_ms,
            history: History::new(behavior),
        }
    }

    /// (Re-)enter panic mode at `now`, extending `panic_mode_ends_at` to
    /// `now + panic_mode_hold_ms`, or to `0` (effectively disabled) if the
    /// hold duration is non-positive.
    pub fn refresh_panic_mode(&mut self, now: i64) {
        self.panic_mode_ends_at = if self.panic_mode_hold_ms > 0 {
            now + self.panic_mode_hold_ms
        } else {
            0
        };
    }

    /// Whether panic mode is currently active.
    pub fn is_panic_mode(&self, now: i64) -> bool {
        self.panic_mode_hold_ms > 0 && now <= self.panic_mode_ends_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        Behavior, ScaleDownPolicy, ScaleUpBehavior, ScaleUpPanicPolicy, ScaleUpStablePolicy,
        SelectPolicy,
    };

    fn behavior() -> Behavior {
        Behavior {
            scale_down: ScaleDownPolicy {
                period_ms: 60_000,
                stabilization_window_ms: 300_000,
                instances: 1,
                percent: 10,
                select_policy: SelectPolicy::Or,
            },
            scale_up: ScaleUpBehavior {
                stable_policy: ScaleUpStablePolicy {
                    period_ms: 60_000,
                    stabilization_window_ms: 0,
                    instances: 4,
                    percent: 100,
                    select_policy: SelectPolicy::Or,
                },
                panic_policy: ScaleUpPanicPolicy {
                    period_ms: 15_000,
                    threshold_percent: 150,
                    hold_ms: 10_000,
                    percent: 50,
                },
            },
        }
    }

    #[test]
    fn panic_mode_activates_and_expires() {
        let mut status = Status::new(&behavior());
        assert!(!status.is_panic_mode(0));
        status.refresh_panic_mode(1000);
        assert_eq!(status.panic_mode_ends_at, 11_000);
        assert!(status.is_panic_mode(1000));
        assert!(status.is_panic_mode(11_000));
        assert!(!status.is_panic_mode(11_001));
    }

    #[test]
    fn zero_hold_disables_panic_mode() {
        let mut b = behavior();
        b.scale_up.panic_policy.hold_ms = 0;
        let mut status = Status::new(&b);
        status.refresh_panic_mode(1000);
        assert_eq!(status.panic_mode_ends_at, 0);
        assert!(!status.is_panic_mode(1000));
    }

    #[test]
    fn append_feeds_all_five_windows() {
        let mut status = Status::new(&behavior());
        status.append(0, 7, 5);
        assert_eq!(status.history.max_recommendation.get_best(0), Some(7));
        assert_eq!(status.history.min_recommendation.get_best(0), Some(7));
        assert_eq!(status.history.max_corrected.get_best(5), Some(5));
        assert_eq!(status.history.min_corrected_for_stable.get_best(5), Some(5));
        assert_eq!(status.history.min_corrected_for_panic.get_best(5), Some(5));
    }
}
