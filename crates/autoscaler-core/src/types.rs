//! Core domain types shared across the recommendation, correction and
//! reconciliation layers.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A reference to a workload plus the scrape coordinates for its instances.
/// Immutable for the lifetime of a binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    /// Namespace the workload lives in.
    pub namespace: String,
    /// Workload name.
    pub name: String,
    /// Workload kind (e.g. `"ModelServing"`).
    pub kind: String,
    /// Label selector used to list the workload's instances.
    pub match_labels: HashMap<String, String>,
    /// Port to scrape on each instance.
    pub port: u16,
    /// URI path of the metric exposition endpoint.
    pub uri: String,
}

impl Target {
    /// A human-readable identifier for logging (`namespace/name`).
    pub fn id(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

/// Mapping from metric name to target value. A target value at or below
/// [`ZERO_TARGET_EPSILON`] is a sentinel meaning "always scale up to max"
/// whenever the metric itself is positive.
pub type MetricTargets = HashMap<String, f64>;

/// A metric target at or below this value is treated as a zero-target
/// sentinel.
pub const ZERO_TARGET_EPSILON: f64 = 1e-6;

/// Cap substituted for an unbounded `desired` computation before the final
/// clamp to `[min, max]`.
pub const UNBOUNDED_DESIRED_CAP: f64 = 1_000_000_000.0;

/// `[min, max]` replica bounds for a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    /// Minimum replica count, inclusive.
    pub min: i64,
    /// Maximum replica count, inclusive.
    pub max: i64,
}

impl Bounds {
    /// Clamp `value` into `[min, max]`.
    pub fn clamp(&self, value: i64) -> i64 {
        value.clamp(self.min, self.max)
    }

    /// Validate that `min <= max` and both are non-negative.
    pub fn validate(&self) -> Result<(), String> {
        if self.min < 0 || self.max < 0 {
            return Err(format!(
                "bounds must be non-negative, got min={} max={}",
                self.min, self.max
            ));
        }
        if self.min > self.max {
            return Err(format!(
                "min ({}) must be <= max ({})",
                self.min, self.max
            ));
        }
        Ok(())
    }
}

/// Combinator merging an absolute-delta rate limit and a percent-delta rate
/// limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectPolicy {
    /// Strict: the constraint must satisfy both caps (intersection).
    And,
    /// Loose: the constraint need only satisfy either cap (union).
    Or,
}

/// Per-period scale-down rate limit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleDownPolicy {
    /// Length of the period this limit applies over, in milliseconds.
    pub period_ms: i64,
    /// Stabilization window, in milliseconds.
    pub stabilization_window_ms: i64,
    /// Maximum absolute instance delta allowed per period.
    pub instances: i64,
    /// Maximum percentage delta allowed per period (whole percent).
    pub percent: i64,
    /// How the absolute and percent caps are combined.
    pub select_policy: SelectPolicy,
}

/// Per-period scale-up rate limit used while not in panic mode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleUpStablePolicy {
    /// Length of the period this limit applies over, in milliseconds.
    pub period_ms: i64,
    /// Stabilization window, in milliseconds.
    pub stabilization_window_ms: i64,
    /// Maximum absolute instance delta allowed per period.
    pub instances: i64,
    /// Maximum percentage delta allowed per period (whole percent).
    pub percent: i64,
    /// How the absolute and percent caps are combined.
    pub select_policy: SelectPolicy,
}

/// Panic-mode scale-up policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleUpPanicPolicy {
    /// Length of the period this limit applies over, in milliseconds.
    pub period_ms: i64,
    /// `recommended*100 >= current*threshold_percent` triggers panic entry.
    pub threshold_percent: i64,
    /// How long panic mode is held once (re-)triggered, in milliseconds.
    pub hold_ms: i64,
    /// Percentage cap on relative scale-up while in panic mode.
    pub percent: i64,
}

/// The full scale-up sub-policy: stable-mode and panic-mode rate limits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleUpBehavior {
    /// Rate limit used while not in panic mode.
    pub stable_policy: ScaleUpStablePolicy,
    /// Rate limit and entry condition used while in panic mode.
    pub panic_policy: ScaleUpPanicPolicy,
}

/// Declarative scale-up/scale-down behavior policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Behavior {
    /// Scale-down rate limit.
    pub scale_down: ScaleDownPolicy,
    /// Scale-up rate limits (stable + panic).
    pub scale_up: ScaleUpBehavior,
}

/// Per-backend configuration for the multi-backend optimizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendParams {
    /// The backend's scrape target.
    pub target: Target,
    /// Minimum replicas for this backend.
    pub min_replicas: i64,
    /// Maximum replicas for this backend.
    pub max_replicas: i64,
    /// Relative cost of one replica of this backend.
    pub cost: f64,
}

/// Configuration for an [`crate::optimizer::Optimizer`] binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfiguration {
    /// Per-backend parameters, in declaration order (their index is the
    /// tie-breaker for equal-cost blocks).
    pub params: Vec<BackendParams>,
    /// Rate at which packet length grows between successive blocks of the
    /// same backend, as a percentage (`100` = no growth, one block per
    /// backend).
    pub cost_expansion_rate_percent: i64,
}

impl OptimizerConfiguration {
    /// Validate `cost_expansion_rate_percent >= 100` and that every
    /// backend's bounds are internally consistent.
    pub fn validate(&self) -> Result<(), String> {
        if self.cost_expansion_rate_percent < 100 {
            return Err(format!(
                "cost_expansion_rate_percent must be >= 100, got {}",
                self.cost_expansion_rate_percent
            ));
        }
        for backend in &self.params {
            if backend.min_replicas < 0
                || backend.max_replicas < 0
                || backend.min_replicas > backend.max_replicas
            {
                return Err(format!(
                    "invalid bounds for backend {}: min={} max={}",
                    backend.target.id(),
                    backend.min_replicas,
                    backend.max_replicas
                ));
            }
        }
        Ok(())
    }

    /// Sum of all backends' minimum replicas.
    pub fn total_min(&self) -> i64 {
        self.params.iter().map(|p| p.min_replicas).sum()
    }

    /// Sum of all backends' maximum replicas.
    pub fn total_max(&self) -> i64 {
        self.params.iter().map(|p| p.max_replicas).sum()
    }
}

/// Declarative configuration for a single [`Target`]'s recommendation
/// inputs: bounds, tolerance and per-metric targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    /// `[min, max]` replica bounds.
    pub bounds: Bounds,
    /// Symmetric dead-band around ratio 1.0, e.g. `0.1` for 10%.
    pub tolerance: f64,
    /// Per-metric target values.
    pub metric_targets: MetricTargets,
    /// Scale-up/scale-down rate-limit behavior.
    pub behavior: Behavior,
}

impl Policy {
    /// Validate tolerance, bounds, and that every select policy is a
    /// recognized variant. `SelectPolicy` is a Rust enum so an unknown
    /// string never round-trips this far; this validates the numeric
    /// fields that a hand-authored config file could get wrong.
    pub fn validate(&self) -> Result<(), String> {
        self.bounds.validate()?;
        if self.tolerance < 0.0 {
            return Err(format!("tolerance must be >= 0, got {}", self.tolerance));
        }
        if self.behavior.scale_down.period_ms <= 0
            || self.behavior.scale_up.stable_policy.period_ms <= 0
            || self.behavior.scale_up.panic_policy.period_ms <= 0
        {
            return Err("behavior periods must be positive".to_string());
        }
        Ok(())
    }
}

/// Per-instance ready-state metric readings for one target.
pub type InstanceMetrics = HashMap<String, f64>;

/// External metrics supplied alongside per-instance metrics.
pub type ExternalMetrics = HashMap<String, f64>;
