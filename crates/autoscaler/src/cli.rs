//! Command-line flags: cluster-config and leader-election flags are
//! parsed here and handed to wrapper plumbing only; nothing in this module
//! feeds the recommendation or correction algorithms.

use std::path::PathBuf;

use clap::Parser;

/// Autoscaler reconciler for inference-serving workloads.
#[derive(Debug, Parser)]
#[command(name = "autoscaler", version, about)]
pub struct Cli {
    /// Path to the binding/policy/workload seed file (TOML). Stands in for
    /// a real cluster-orchestration client's informer caches.
    #[arg(long, env = "AUTOSCALER_CONFIG", default_value = "autoscaler.toml")]
    pub config: PathBuf,

    /// Namespace the reconciler watches.
    #[arg(long, env = "AUTOSCALER_NAMESPACE")]
    pub namespace: Option<String>,

    /// Reconcile tick cadence, in seconds (single-digit seconds by
    /// default).
    #[arg(long, env = "AUTOSCALER_SYNC_PERIOD_SECS")]
    pub sync_period_secs: Option<u64>,

    /// Per-tick deadline, in seconds.
    #[arg(long, env = "AUTOSCALER_TICK_TIMEOUT_SECS")]
    pub tick_timeout_secs: Option<u64>,

    /// Port the self-metrics exporter listens on.
    #[arg(long, env = "AUTOSCALER_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// Enable the leader-election wrapper. This flag only gates whether
    /// `main` waits for a lease before ticking; it never touches the
    /// algorithm.
    #[arg(long, env = "AUTOSCALER_LEADER_ELECTION")]
    pub leader_election: bool,

    /// Lease name used by the leader-election wrapper.
    #[arg(long, env = "AUTOSCALER_LEASE_NAME", default_value = "autoscaler-leader")]
    pub lease_name: String,
}
