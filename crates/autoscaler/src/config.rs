//! Configuration loading: seed-data TOML file plus CLI/environment
//! overrides, hierarchy `CLI/env > file > defaults`; grounded on
//! `knhk-config`'s `load_config`/`apply_env_overrides` layering,
//! generalized since this binary's scalar knobs are already env-aware
//! through `clap`'s `env = "..."` attributes.
//!
//! The seed file also plays the role a real cluster-orchestration client's
//! informer caches would: policies, bindings, workloads and instances are
//! declared once at startup and held in memory for the process lifetime.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use autoscaler_core::traits::{Binding, BindingSpec, Instance, Workload};
use autoscaler_core::types::{
    Behavior, Bounds, MetricTargets, OptimizerConfiguration, Policy, ScaleDownPolicy,
    ScaleUpBehavior, ScaleUpPanicPolicy, ScaleUpStablePolicy, SelectPolicy, Target,
};

use crate::cli::Cli;

/// Errors raised while loading or validating the seed configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The seed file could not be read.
    #[error("failed to read config file {path}: {reason}")]
    Io {
        /// Path that failed to read.
        path: String,
        /// Underlying I/O failure reason.
        reason: String,
    },
    /// The seed file was not valid TOML, or didn't match the expected shape.
    #[error("failed to parse config file {path}: {reason}")]
    Parse {
        /// Path that failed to parse.
        path: String,
        /// Underlying parse failure reason.
        reason: String,
    },
    /// A policy or binding failed semantic validation.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RuntimeSettings {
    namespace: Option<String>,
    sync_period_secs: Option<u64>,
    tick_timeout_secs: Option<u64>,
    metrics_port: Option<u16>,
    slo_percentile: Option<f64>,
    histogram_fresh_secs: Option<i64>,
    histogram_expire_secs: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
struct SelectPolicyDef(String);

impl SelectPolicyDef {
    fn resolve(&self) -> Result<SelectPolicy, ConfigError> {
        match self.0.to_ascii_lowercase().as_str() {
            "and" => Ok(SelectPolicy::And),
            "or" => Ok(SelectPolicy::Or),
            other => Err(ConfigError::Validation(format!(
                "unknown select policy {other:?}; expected \"and\" or \"or\""
            ))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ScaleDownDef {
    period_secs: i64,
    stabilization_window_secs: i64,
    instances: i64,
    percent: i64,
    select_policy: SelectPolicyDef,
}

#[derive(Debug, Clone, Deserialize)]
struct ScaleUpStableDef {
    period_secs: i64,
    stabilization_window_secs: i64,
    instances: i64,
    percent: i64,
    select_policy: SelectPolicyDef,
}

#[derive(Debug, Clone, Deserialize)]
struct ScaleUpPanicDef {
    period_secs: i64,
    threshold_percent: i64,
    hold_secs: i64,
    percent: i64,
}

#[derive(Debug, Clone, Deserialize)]
struct ScaleUpDef {
    stable: ScaleUpStableDef,
    panic: ScaleUpPanicDef,
}

#[derive(Debug, Clone, Deserialize)]
struct BehaviorDef {
    scale_down: ScaleDownDef,
    scale_up: ScaleUpDef,
}

impl BehaviorDef {
    fn resolve(&self) -> Result<Behavior, ConfigError> {
        Ok(Behavior {
            scale_down: ScaleDownPolicy {
                period_ms: self.scale_down.period_secs * 1000,
                stabilization_window_ms: self.scale_down.stabilization_window_secs * 1000,
                instances: self.scale_down.instances,
                percent: self.scale_down.percent,
                select_policy: self.scale_down.select_policy.resolve()?,
            },
            scale_up: ScaleUpBehavior {
                stable_policy: ScaleUpStablePolicy {
                    period_ms: self.scale_up.stable.period_secs * 1000,
                    stabilization_window_ms: self.scale_up.stable.stabilization_window_secs * 1000,
                    instances: self.scale_up.stable.instances,
                    percent: self.scale_up.stable.percent,
                    select_policy: self.scale_up.stable.select_policy.resolve()?,
                },
                panic_policy: ScaleUpPanicPolicy {
                    period_ms: self.scale_up.panic.period_secs * 1000,
                    threshold_percent: self.scale_up.panic.threshold_percent,
                    hold_ms: self.scale_up.panic.hold_secs * 1000,
                    percent: self.scale_up.panic.percent,
                },
            },
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
struct PolicyDef {
    min_replicas: i64,
    max_replicas: i64,
    tolerance_percent: f64,
    #[serde(default)]
    metric_targets: MetricTargets,
    behavior: BehaviorDef,
}

impl PolicyDef {
    fn resolve(&self, name: &str) -> Result<Policy, ConfigError> {
        let policy = Policy {
            bounds: Bounds {
                min: self.min_replicas,
                max: self.max_replicas,
            },
            tolerance: self.tolerance_percent / 100.0,
            metric_targets: self.metric_targets.clone(),
            behavior: self.behavior.resolve()?,
        };
        policy
            .validate()
            .map_err(|e| ConfigError::Validation(format!("policy {name}: {e}")))?;
        Ok(policy)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct TargetDef {
    namespace: String,
    name: String,
    kind: String,
    #[serde(default)]
    match_labels: HashMap<String, String>,
    port: u16,
    uri: String,
}

impl TargetDef {
    fn resolve(&self) -> Target {
        Target {
            namespace: self.namespace.clone(),
            name: self.name.clone(),
            kind: self.kind.clone(),
            match_labels: self.match_labels.clone(),
            port: self.port,
            uri: self.uri.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct BackendDef {
    target: TargetDef,
    min_replicas: i64,
    max_replicas: i64,
    cost: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct OptimizerDef {
    cost_expansion_rate_percent: i64,
    params: Vec<BackendDef>,
}

impl OptimizerDef {
    fn resolve(&self) -> Result<OptimizerConfiguration, ConfigError> {
        let config = OptimizerConfiguration {
            params: self
                .params
                .iter()
                .map(|b| autoscaler_core::types::BackendParams {
                    target: b.target.resolve(),
                    min_replicas: b.min_replicas,
                    max_replicas: b.max_replicas,
                    cost: b.cost,
                })
                .collect(),
            cost_expansion_rate_percent: self.cost_expansion_rate_percent,
        };
        config
            .validate()
            .map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
enum BindingSpecDef {
    /// Single-target homogeneous autoscaler.
    Scaling {
        /// The workload this binding scales.
        target: TargetDef,
    },
    /// Multi-backend optimizer.
    Optimizing {
        /// The optimizer's backend parameters.
        optimizer: OptimizerDef,
    },
}

#[derive(Debug, Clone, Deserialize)]
struct BindingDef {
    namespace: String,
    name: String,
    policy: String,
    #[serde(flatten)]
    spec: BindingSpecDef,
}

#[derive(Debug, Clone, Deserialize)]
struct WorkloadSeed {
    replicas: i64,
    #[serde(default = "default_resource_version")]
    resource_version: String,
}

fn default_resource_version() -> String {
    "1".to_string()
}

#[derive(Debug, Clone, Deserialize)]
struct InstanceSeed {
    id: String,
    ip: String,
    #[serde(default = "default_true")]
    ready: bool,
    #[serde(default)]
    terminal_phase: bool,
    #[serde(default)]
    deletion_requested: bool,
    #[serde(default)]
    restart_count: u32,
    #[serde(default)]
    start_time_ms: i64,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SeedFile {
    #[serde(default)]
    runtime: RuntimeSettings,
    #[serde(default)]
    policies: HashMap<String, PolicyDef>,
    #[serde(default)]
    bindings: Vec<BindingDef>,
    #[serde(default)]
    workloads: HashMap<String, WorkloadSeed>,
    #[serde(default)]
    instances: HashMap<String, Vec<InstanceSeed>>,
}

/// Fully resolved application configuration: runtime knobs plus the
/// in-memory policy/binding/workload/instance seed data.
pub struct AppConfig {
    /// Namespace the reconciler watches.
    pub namespace: String,
    /// Reconcile tick cadence.
    pub sync_period: std::time::Duration,
    /// Per-tick deadline.
    pub tick_timeout: std::time::Duration,
    /// Self-metrics exporter port.
    pub metrics_port: u16,
    /// Percentile used for histogram SLO metrics.
    pub slo_percentile: f64,
    /// Freshness parameter for the per-instance histogram snapshot window.
    pub histogram_fresh_ms: i64,
    /// Hard expiry for the per-instance histogram snapshot window.
    pub histogram_expire_ms: i64,
    /// Resolved policies, keyed by name.
    pub policies: HashMap<String, Policy>,
    /// Resolved bindings.
    pub bindings: Vec<Binding>,
    /// Seed workload state, keyed by `namespace/name`.
    pub workloads: HashMap<String, Workload>,
    /// Seed instance lists, keyed by `namespace/name` of their target.
    pub instances: HashMap<String, Vec<Instance>>,
}

impl AppConfig {
    /// Load the seed file named by `cli.config` (if it exists; a missing
    /// file is not an error, matching `knhk-config`'s "defaults if absent"
    /// behavior) and layer `cli`'s flags over its `[runtime]` section.
    pub fn load(cli: &Cli) -> Result<AppConfig, ConfigError> {
        let seed = if cli.config.exists() {
            read_seed_file(&cli.config)?
        } else {
            tracing::warn!(path = %cli.config.display(), "config file not found; using defaults");
            SeedFile::default()
        };

        let namespace = cli
            .namespace
            .clone()
            .or(seed.runtime.namespace.clone())
            .unwrap_or_else(|| "default".to_string());
        let sync_period_secs = cli
            .sync_period_secs
            .or(seed.runtime.sync_period_secs)
            .unwrap_or(15);
        let tick_timeout_secs = cli
            .tick_timeout_secs
            .or(seed.runtime.tick_timeout_secs)
            .unwrap_or(30);
        let metrics_port = cli
            .metrics_port
            .or(seed.runtime.metrics_port)
            .unwrap_or(9094);
        let slo_percentile = seed.runtime.slo_percentile.unwrap_or(99.0);
        let histogram_fresh_ms = seed.runtime.histogram_fresh_secs.unwrap_or(60) * 1000;
        let histogram_expire_ms = seed.runtime.histogram_expire_secs.unwrap_or(600) * 1000;

        let mut policies = HashMap::new();
        for (name, def) in &seed.policies {
            policies.insert(name.clone(), def.resolve(name)?);
        }

        let mut bindings = Vec::new();
        for def in &seed.bindings {
            let spec = match &def.spec {
                BindingSpecDef::Scaling { target } => BindingSpec::Scaling {
                    target: target.resolve(),
                },
                BindingSpecDef::Optimizing { optimizer } => BindingSpec::Optimizing {
                    optimizer: optimizer.resolve()?,
                },
            };
            bindings.push(Binding {
                namespace: def.namespace.clone(),
                name: def.name.clone(),
                policy_name: def.policy.clone(),
                spec,
            });
        }

        let workloads = seed
            .workloads
            .into_iter()
            .map(|(key, w)| {
                (
                    key,
                    Workload {
                        resource_version: w.resource_version,
                        replicas: w.replicas,
                    },
                )
            })
            .collect();

        let instances = seed
            .instances
            .into_iter()
            .map(|(key, list)| {
                let resolved = list
                    .into_iter()
                    .map(|i| Instance {
                        id: i.id,
                        ip: i.ip,
                        ready: i.ready,
                        terminal_phase: i.terminal_phase,
                        deletion_requested: i.deletion_requested,
                        restart_count: i.restart_count,
                        start_time_ms: i.start_time_ms,
                    })
                    .collect();
                (key, resolved)
            })
            .collect();

        Ok(AppConfig {
            namespace,
            sync_period: std::time::Duration::from_secs(sync_period_secs),
            tick_timeout: std::time::Duration::from_secs(tick_timeout_secs),
            metrics_port,
            slo_percentile,
            histogram_fresh_ms,
            histogram_expire_ms,
            policies,
            bindings,
            workloads,
            instances,
        })
    }
}

fn read_seed_file(path: &Path) -> Result<SeedFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    toml::from_str(&content).map_err(|e| ConfigError::Parse {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}
