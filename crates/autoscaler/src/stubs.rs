//! In-process implementations of the `autoscaler-core` trait boundary,
//! standing in for the generated typed clients and informers a real
//! cluster-orchestration client would provide. Grounded on rMiniK8s's
//! `Store<T>` shape — an
//! `Arc<RwLock<HashMap<..>>>` guarding the same kind of cached cluster state
//! a real client library would otherwise maintain — seeded once at startup
//! from [`crate::config::AppConfig`] and mutated in place as the reconciler
//! issues replica updates.
//!
//! [`ReqwestScraper`] is the one store that does real I/O: it is the actual
//! HTTP boundary the collector scrapes through, not a stand-in.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;

use autoscaler_core::error::{AutoscalerError, Result};
use autoscaler_core::traits::{
    Binding, BindingStore, Instance, InstanceLister, MetricScraper, PolicyStore, Workload,
    WorkloadStore, WorkloadUpdater,
};
use autoscaler_core::types::{Policy, Target};

/// Namespaced policy and binding definitions, plus per-target workload and
/// instance state, held in memory for the process lifetime.
pub struct InMemoryCluster {
    policies: RwLock<HashMap<String, Policy>>,
    bindings: RwLock<Vec<Binding>>,
    workloads: RwLock<HashMap<String, Workload>>,
    instances: RwLock<HashMap<String, Vec<Instance>>>,
}

impl InMemoryCluster {
    /// Seed a cluster from loaded configuration. Policy and binding names
    /// are scoped by the namespace the reconciler watches; workload and
    /// instance keys are already `namespace/name` per `Target::id`.
    pub fn new(
        policies: HashMap<String, Policy>,
        bindings: Vec<Binding>,
        workloads: HashMap<String, Workload>,
        instances: HashMap<String, Vec<Instance>>,
    ) -> Self {
        Self {
            policies: RwLock::new(policies),
            bindings: RwLock::new(bindings),
            workloads: RwLock::new(workloads),
            instances: RwLock::new(instances),
        }
    }
}

#[async_trait]
impl PolicyStore for InMemoryCluster {
    async fn get_policy(&self, _namespace: &str, name: &str) -> Result<Option<Policy>> {
        Ok(self
            .policies
            .read()
            .map_err(|_| AutoscalerError::Sync("policy store lock poisoned".to_string()))?
            .get(name)
            .cloned())
    }
}

#[async_trait]
impl BindingStore for InMemoryCluster {
    async fn list_bindings(&self, namespace: &str) -> Result<Vec<Binding>> {
        Ok(self
            .bindings
            .read()
            .map_err(|_| AutoscalerError::Sync("binding store lock poisoned".to_string()))?
            .iter()
            .filter(|b| b.namespace == namespace)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl WorkloadStore for InMemoryCluster {
    async fn get_workload(&self, target: &Target) -> Result<Option<Workload>> {
        Ok(self
            .workloads
            .read()
            .map_err(|_| AutoscalerError::Sync("workload store lock poisoned".to_string()))?
            .get(&target.id())
            .cloned())
    }
}

#[async_trait]
impl WorkloadUpdater for InMemoryCluster {
    async fn update_replicas(
        &self,
        target: &Target,
        resource_version: &str,
        replicas: i64,
    ) -> Result<()> {
        let mut workloads = self
            .workloads
            .write()
            .map_err(|_| AutoscalerError::Sync("workload store lock poisoned".to_string()))?;
        let current = workloads.get(&target.id());
        match current {
            Some(w) if w.resource_version != resource_version => Err(AutoscalerError::Conflict {
                workload: target.id(),
                reason: format!(
                    "stale resource version {resource_version} (current is {})",
                    w.resource_version
                ),
            }),
            _ => {
                let next_version = current
                    .map(|w| w.resource_version.parse::<u64>().unwrap_or(0) + 1)
                    .unwrap_or(1);
                workloads.insert(
                    target.id(),
                    Workload {
                        resource_version: next_version.to_string(),
                        replicas,
                    },
                );
                tracing::info!(target = %target.id(), replicas, "applied replica update");
                Ok(())
            }
        }
    }
}

#[async_trait]
impl InstanceLister for InMemoryCluster {
    async fn list_instances(&self, target: &Target) -> Result<Vec<Instance>> {
        Ok(self
            .instances
            .read()
            .map_err(|_| AutoscalerError::Sync("instance lister lock poisoned".to_string()))?
            .get(&target.id())
            .cloned()
            .unwrap_or_default())
    }
}

/// The real HTTP scrape boundary: a pooled [`reqwest::Client`] hitting each
/// instance's metric exposition endpoint directly.
pub struct ReqwestScraper {
    client: reqwest::Client,
}

impl ReqwestScraper {
    /// Build a scraper with a bounded per-request timeout so one wedged
    /// instance cannot stall an entire tick.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AutoscalerError::Other(e.into()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl MetricScraper for ReqwestScraper {
    async fn scrape(&self, ip: &str, port: u16, uri: &str) -> Result<String> {
        let url = format!("http://{ip}:{port}{uri}");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AutoscalerError::Scrape {
                target: url.clone(),
                reason: e.to_string(),
            })?;
        if !response.status().is_success() {
            return Err(AutoscalerError::Scrape {
                target: url,
                reason: format!("unexpected status {}", response.status()),
            });
        }
        response
            .text()
            .await
            .map_err(|e| AutoscalerError::Scrape {
                target: url,
                reason: e.to_string(),
            })
    }
}
