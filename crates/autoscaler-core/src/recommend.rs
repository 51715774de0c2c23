//! The recommendation algorithm: a pure function mapping instance-level
//! and external metrics to a desired replica count.

use crate::types::{
    Bounds, ExternalMetrics, InstanceMetrics, MetricTargets, UNBOUNDED_DESIRED_CAP,
    ZERO_TARGET_EPSILON,
};

fn within_tolerance(ratio: f64, tolerance: f64) -> bool {
    (ratio - 1.0).abs() <= tolerance
}

fn direction_of(ratio: f64) -> i32 {
    if ratio >= 1.0 {
        1
    } else {
        -1
    }
}

fn external_contribution(metric: f64, target: f64, current_count: i64, tolerance: f64) -> i64 {
    let desired = if target.abs() <= ZERO_TARGET_EPSILON {
        if metric > 0.0 {
            UNBOUNDED_DESIRED_CAP
        } else {
            0.0
        }
    } else {
        metric / target
    };
    let ratio = desired / current_count as f64;
    if within_tolerance(ratio, tolerance) {
        current_count
    } else {
        desired.ceil() as i64
    }
}

/// `None` means the target yielded nothing this tick (no ready instance
/// reported the metric at all).
fn instance_contribution(
    target: f64,
    current_count: i64,
    tolerance: f64,
    unready_count: i64,
    name: &str,
    ready_instance_metrics: &[InstanceMetrics],
) -> Option<i64> {
    let mut metrics_count: i64 = 0;
    let mut missing_count: i64 = 0;
    let mut sum = 0.0_f64;
    for instance in ready_instance_metrics {
        match instance.get(name) {
            Some(&v) => {
                metrics_count += 1;
                sum += v;
            }
            None => missing_count += 1,
        }
    }
    if metrics_count == 0 {
        return None;
    }

    let ratio = (sum / metrics_count as f64) / target;
    let direction = direction_of(ratio);
    // Unready instances only widen the room to scale up, never scale down.
    let should_add_unready = unready_count > 0 && direction > 0;

    if missing_count == 0 && !should_add_unready {
        return Some(if within_tolerance(ratio, tolerance) {
            current_count
        } else {
            (ratio * metrics_count as f64).ceil() as i64
        });
    }

    let mut n = metrics_count + missing_count;
    if should_add_unready {
        n += unready_count;
    }
    let mut numerator = sum;
    if direction < 0 {
        // Scaling down: treat each missing instance as reporting exactly
        // target, biasing against aggressive scale-down on missing data.
        numerator += missing_count as f64 * target;
    }
    // Unready instances contribute zero to the numerator either way.
    let new_ratio = (numerator / n as f64) / target;
    let new_direction = direction_of(new_ratio);

    if within_tolerance(new_ratio, tolerance) || new_direction != direction {
        return Some(current_count);
    }

    let proposed = (new_ratio * n as f64).ceil() as i64;
    let proposed_direction = match proposed.cmp(&current_count) {
        std::cmp::Ordering::Greater => 1,
        std::cmp::Ordering::Less => -1,
        std::cmp::Ordering::Equal => 0,
    };
    if proposed_direction != 0 && proposed_direction != new_direction {
        Some(current_count)
    } else {
        Some(proposed)
    }
}

/// Compute a desired replica count from instance and external metrics.
///
/// Returns `(replicas, skip)`. `skip == true` means there was insufficient
/// evidence to act — callers must not invoke [`crate::correct::correct`] in
/// that case, and must not otherwise act on `replicas`.
pub fn recommend(
    bounds: &Bounds,
    current_count: i64,
    tolerance: f64,
    metric_targets: &MetricTargets,
    unready_count: i64,
    ready_instance_metrics: &[InstanceMetrics],
    external_metrics: &ExternalMetrics,
) -> (i64, bool) {
    if current_count < bounds.min {
        return (bounds.min, false);
    }
    if current_count > bounds.max {
        return (bounds.max, false);
    }

    let mut result: i64 = 0;
    let mut skip = true;

    for (name, &target) in metric_targets {
        let contribution = if let Some(&metric) = external_metrics.get(name) {
            external_contribution(metric, target, current_count, tolerance)
        } else {
            match instance_contribution(
                target,
                current_count,
                tolerance,
                unready_count,
                name,
                ready_instance_metrics,
            ) {
                Some(c) => c,
                None => continue,
            }
        };
        skip = false;
        result = result.max(contribution);
    }

    if !skip {
        result = bounds.clamp(result);
    }
    (result, skip)
}
