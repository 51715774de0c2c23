//! The correction algorithm: enforces rate limits, stabilization windows
//! and panic-mode overrides on a raw recommendation.

use crate::status::History;
use crate::types::{Behavior, Bounds, ScaleUpPanicPolicy, SelectPolicy};

/// Whether `recommended`/`current` should (re-)trigger panic mode:
/// `recommended * 100 >= current * thresholdPercent`.
///
/// `current == 0` never triggers panic on its own. At zero current
/// replicas the recommendation algorithm's clamp-first step already forces
/// clamp-first step already forces `recommended` toward `min`/`max`
/// independent of ratios, so unconditionally panicking on every binding's
/// cold start would hold panic mode for a full `panicHoldMs` with no
/// useful signal behind it.
pub fn should_enter_panic(
    recommended: i64,
    current: i64,
    panic_policy: &ScaleUpPanicPolicy,
) -> bool {
    current > 0 && recommended * 100 >= current * panic_policy.threshold_percent
}

/// Apply rate limits, stabilization and panic-mode overrides to a raw
/// recommendation. `history`'s record windows need `now` to expire stale
/// samples; its line-chart windows have already expired internally at
/// their last `append` and only need a starting value to improve on.
pub fn correct(
    recommended: i64,
    current: i64,
    bounds: &Bounds,
    behavior: &Behavior,
    history: &mut History,
    is_panic: bool,
    now: i64,
) -> i64 {
    if is_panic {
        let mut c = recommended;
        if let Some(p) = history.min_corrected_for_panic.get_best(current) {
            let rel_cap = p + (p * behavior.scale_up.panic_policy.percent) / 100;
            c = c.min(rel_cap);
        }
        // Panic never scales down.
        c = c.max(current);
        return bounds.clamp(c);
    }

    if recommended < current {
        let mut c = recommended;
        if let Some(r_hat) = history.max_recommendation.get_best(now) {
            c = c.max(r_hat);
        }
        if let Some(p) = history.max_corrected.get_best(current) {
            let abs_cap = p - behavior.scale_down.instances;
            let rel_cap = p - (p * behavior.scale_down.percent) / 100;
            let constraint = match behavior.scale_down.select_policy {
                SelectPolicy::Or => abs_cap.min(rel_cap),
                SelectPolicy::And => abs_cap.max(rel_cap),
            };
            c = c.max(constraint);
        }
        // Never scale up in the down branch.
        c = c.min(current);
        return bounds.clamp(c);
    }

    if recommended > current {
        let mut c = recommended;
        if let Some(r_hat) = history.min_recommendation.get_best(now) {
            c = c.min(r_hat);
        }
        if let Some(p) = history.min_corrected_for_stable.get_best(current) {
            let abs_cap = p + behavior.scale_up.stable_policy.instances;
            let rel_cap = p + (p * behavior.scale_up.stable_policy.percent) / 100;
            let constraint = match behavior.scale_up.stable_policy.select_policy {
                SelectPolicy::Or => abs_cap.max(rel_cap),
                SelectPolicy::And => abs_cap.min(rel_cap),
            };
            c = c.min(constraint);
        }
        c = c.max(current);
        return bounds.clamp(c);
    }

    bounds.clamp(recommended)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        Bounds, ScaleDownPolicy, ScaleUpBehavior, ScaleUpPanicPolicy, ScaleUpStablePolicy,
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
    fn s7_panic_entry_with_empty_history_clamps_to_recommended() {
        let b = behavior();
        assert!(should_enter_panic(20, 10, &b.scale_up.panic_policy));
        let mut history = History::new(&b);
        let corrected = correct(20, 10, &Bounds { min: 1, max: 100 }, &b, &mut history, true, 0);
        assert_eq!(corrected, 20);
    }

    #[test]
    fn current_zero_never_triggers_panic_on_its_own() {
        let b = behavior();
        assert!(!should_enter_panic(5, 0, &b.scale_up.panic_policy));
    }

    #[test]
    fn panic_never_scales_below_current() {
        let b = behavior();
        let mut history = History::new(&b);
        // recommended below current: panic branch still clamps up to current.
        let corrected = correct(5, 10, &Bounds { min: 1, max: 100 }, &b, &mut history, true, 0);
        assert!(corrected >= 10);
    }

    #[test]
    fn panic_rate_limit_caps_growth_from_history_seed() {
        let b = behavior();
        let mut history = History::new(&b);
        // Seed MinCorrectedForPanic with 10 at t=0 so a later panic-mode
        // correction is capped at 10 + 50% = 15.
        history.min_corrected_for_panic.append(0, 10);
        let corrected = correct(50, 10, &Bounds { min: 1, max: 100 }, &b, &mut history, true, 100);
        assert_eq!(corrected, 15);
    }

    #[test]
    fn stable_scale_down_respects_max_recommendation_floor() {
        let b = behavior();
        let mut history = History::new(&b);
        history.max_recommendation.append(0, 8);
        let corrected = correct(
            3,
            10,
            &Bounds { min: 1, max: 100 },
            &b,
            &mut history,
            false,
            1000,
        );
        assert!(corrected >= 8);
    }

    #[test]
    fn no_change_branch_clamps_recommended() {
        let b = behavior();
        let mut history = History::new(&b);
        let corrected = correct(7, 7, &Bounds { min: 1, max: 100 }, &b, &mut history, false, 0);
        assert_eq!(corrected, 7);
    }

    #[test]
    fn stable_scale_down_never_exceeds_current() {
        let b = behavior();
        let mut history = History::new(&b);
        let corrected = correct(
            3,
            10,
            &Bounds { min: 1, max: 100 },
            &b,
            &mut history,
            false,
            0,
        );
        assert!(corrected <= 10);
    }

    #[test]
    fn stable_scale_up_never_below_current() {
        let b = behavior();
        let mut history = History::new(&b);
        let corrected = correct(
            30,
            10,
            &Bounds { min: 1, max: 100 },
            &b,
            &mut history,
            false,
            0,
        );
        assert!(corrected >= 10);
    }
}
