//! External collaborator boundary: the control-plane object kinds the
//! reconciler reads, the scrape endpoint, and the workload mutation it
//! writes back. Each boundary is a small trait; this crate ships one
//! in-process implementation of each so the reconciler and scalers run
//! end to end without a real cluster-orchestration client.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{OptimizerConfiguration, Policy, Target};

/// An instance backing a [`Target`], as observed by the instance lister.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    /// Stable identifier used to key per-instance histogram state
    /// (typically the instance IP).
    pub id: String,
    /// IP address to scrape.
    pub ip: String,
    /// Running and ready condition true.
    pub ready: bool,
    /// Terminal phase (succeeded/failed) observed for this instance.
    pub terminal_phase: bool,
    /// Set once deletion has been requested.
    pub deletion_requested: bool,
    /// Total observed container restarts.
    pub restart_count: u32,
    /// Process start time, used to discard stale histogram state across
    /// instance restarts.
    pub start_time_ms: i64,
}

impl Instance {
    /// Failed: terminal phase, deletion requested, or any container
    /// restart observed.
    pub fn is_failed(&self) -> bool {
        self.terminal_phase || self.deletion_requested || self.restart_count > 0
    }
}

/// The authoritative replica count for a workload, plus an opaque
/// concurrency token threaded through read-modify-write updates.
#[derive(Debug, Clone, PartialEq)]
pub struct Workload {
    /// Opaque resource-version token from the most recent read.
    pub resource_version: String,
    /// Current `spec.replicas`.
    pub replicas: i64,
}

/// A binding's configuration discriminator: dispatch on the tagged variant
/// rather than modeling scaling/optimizing bindings as a class hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub enum BindingSpec {
    /// A single-target homogeneous autoscaler.
    Scaling {
        /// The target workload.
        target: Target,
    },
    /// A multi-backend optimizer.
    Optimizing {
        /// Per-backend parameters and the cost-expansion rate.
        optimizer: OptimizerConfiguration,
    },
}

/// A binding pairs a policy reference with either a scaling or optimizing
/// configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    /// Binding's own namespace.
    pub namespace: String,
    /// Binding name, unique within its namespace.
    pub name: String,
    /// Namespaced reference to the [`Policy`] this binding uses.
    pub policy_name: String,
    /// The scaling or optimizing configuration.
    pub spec: BindingSpec,
}

/// Read access to policy objects.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Fetch a policy by name. `Ok(None)` on not-found — the reconciler
    /// skips the binding silently rather than treating it as an error.
    async fn get_policy(&self, namespace: &str, name: &str) -> Result<Option<Policy>>;
}

/// Read access to binding objects.
#[async_trait]
pub trait BindingStore: Send + Sync {
    /// List every binding in `namespace`.
    async fn list_bindings(&self, namespace: &str) -> Result<Vec<Binding>>;
}

/// Read access to a target's current replica count.
#[async_trait]
pub trait WorkloadStore: Send + Sync {
    /// Fetch the current workload state. `Ok(None)` on not-found.
    async fn get_workload(&self, target: &Target) -> Result<Option<Workload>>;
}

/// Read-modify-write access to a target's replica count.
#[async_trait]
pub trait WorkloadUpdater: Send + Sync {
    /// Write a new replica count, guarded by the resource version from the
    /// most recent read. Returns [`crate::error::AutoscalerError::Conflict`]
    /// on a stale version.
    async fn update_replicas(
        &self,
        target: &Target,
        resource_version: &str,
        replicas: i64,
    ) -> Result<()>;
}

/// Read access to a target's backing instances.
#[async_trait]
pub trait InstanceLister: Send + Sync {
    /// List the instances matching a target's selector.
    async fn list_instances(&self, target: &Target) -> Result<Vec<Instance>>;
}

/// The per-instance HTTP scrape boundary.
#[async_trait]
pub trait MetricScraper: Send + Sync {
    /// `GET http://{ip}:{port}{uri}` and return the response body.
    async fn scrape(&self, ip: &str, port: u16, uri: &str) -> Result<String>;
}
