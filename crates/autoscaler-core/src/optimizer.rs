//! The multi-backend optimizer: splits one scalar replica budget across
//! heterogeneous backends by a deterministic, cost-ordered greedy packing
//! rule.

use std::collections::HashMap;

use crate::error::{AutoscalerError, Result};
use crate::traits::{WorkloadStore, WorkloadUpdater};
use crate::types::OptimizerConfiguration;

/// A packable unit of elastic capacity for one backend, built once at
/// construction time.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ReplicaBlock {
    backend_index: usize,
    replicas: i64,
    cost: f64,
}

fn build_blocks(config: &OptimizerConfiguration) -> Vec<ReplicaBlock> {
    let mut blocks = Vec::new();
    for (backend_index, backend) in config.params.iter().enumerate() {
        let mut remaining = backend.max_replicas - backend.min_replicas;
        if remaining <= 0 {
            continue;
        }
        if config.cost_expansion_rate_percent == 100 {
            blocks.push(ReplicaBlock {
                backend_index,
                replicas: remaining,
                cost: backend.cost * remaining as f64,
            });
            continue;
        }
        let mut pkg = 1.0_f64;
        while remaining > 0 {
            let len = (pkg.floor() as i64).max(1).min(remaining);
            blocks.push(ReplicaBlock {
                backend_index,
                replicas: len,
                cost: backend.cost * len as f64,
            });
            remaining -= len;
            pkg *= config.cost_expansion_rate_percent as f64 / 100.0;
        }
    }
    blocks.sort_by(|a, b| {
        a.cost
            .partial_cmp(&b.cost)
            .expect("backend costs must be comparable")
            .then(a.backend_index.cmp(&b.backend_index))
    });
    blocks
}

/// Distributes a replica budget across the backends of an
/// [`OptimizerConfiguration`].
pub struct Optimizer {
    config: OptimizerConfiguration,
    blocks: Vec<ReplicaBlock>,
}

impl Optimizer {
    /// Build the optimizer and its cost-ordered block list once.
    pub fn new(config: OptimizerConfiguration) -> Self {
        let blocks = build_blocks(&config);
        Self { config, blocks }
    }

    /// The backend parameters this optimizer was built from.
    pub fn config(&self) -> &OptimizerConfiguration {
        &self.config
    }

    /// Greedily assign `recommended_total` replicas across backends,
    /// cheapest block first, returning a map keyed by each backend
    /// target's identifier.
    pub fn assign(&self, recommended_total: i64) -> HashMap<String, i64> {
        let total_min = self.config.total_min();
        let total_max = self.config.total_max();
        let clamped_total = recommended_total.clamp(total_min, total_max);

        let mut allocation: Vec<i64> = self.config.params.iter().map(|p| p.min_replicas).collect();
        let mut remaining = clamped_total - total_min;

        for block in &self.blocks {
            if remaining <= 0 {
                break;
            }
            let slot = remaining.min(block.replicas);
            allocation[block.backend_index] += slot;
            remaining -= slot;
        }

        self.config
            .params
            .iter()
            .zip(allocation)
            .map(|(backend, replicas)| (backend.target.id(), replicas))
            .collect()
    }

    /// Read-compare-write each backend's replica count. Aborts on the
    /// first write error, leaving already-written backends in their new
    /// state — there is no transaction spanning the whole backend set.
    pub async fn apply<WS, WU>(
        &self,
        allocation: &HashMap<String, i64>,
        store: &WS,
        updater: &WU,
    ) -> Result<()>
    where
        WS: WorkloadStore,
        WU: WorkloadUpdater,
    {
        for backend in &self.config.params {
            let desired = *allocation
                .get(&backend.target.id())
                .ok_or_else(|| AutoscalerError::NotFound(backend.target.id()))?;
            let workload = store
                .get_workload(&backend.target)
                .await?
                .ok_or_else(|| AutoscalerError::NotFound(backend.target.id()))?;
            if workload.replicas != desired {
                updater
                    .update_replicas(&backend.target, &workload.resource_version, desired)
                    .await?;
            }
        }
        Ok(())
    }
}

/// Binds an [`Optimizer`] to its N backend [`crate::collector::MetricCollector`]s
/// and a shared [`Status`]: a binding sharing one total replica budget
/// across N backends owns one collector per backend but a single status
/// and packing order for the whole group.
pub struct OptimizingAutoscaler<L, S> {
    policy: crate::types::Policy,
    packer: Optimizer,
    collectors: Vec<crate::collector::MetricCollector<L, S>>,
    status: crate::status::Status,
}

impl<L, S> OptimizingAutoscaler<L, S>
where
    L: crate::traits::InstanceLister,
    S: crate::traits::MetricScraper,
{
    /// Build a new multi-backend autoscaler. `collectors` must be given in
    /// the same order as `config.params`.
    pub fn new(
        policy: crate::types::Policy,
        config: OptimizerConfiguration,
        collectors: Vec<crate::collector::MetricCollector<L, S>>,
    ) -> Self {
        let status = crate::status::Status::new(&policy.behavior);
        let packer = Optimizer::new(config);
        Self {
            policy,
            packer,
            collectors,
            status,
        }
    }

    /// Run one full cycle: collect every backend's metrics, recommend and
    /// correct a single scalar total, split it across backends, and apply.
    pub async fn run<WS, WU>(
        &mut self,
        clock: &dyn crate::clock::Clock,
        store: &WS,
        updater: &WU,
        external_metrics: &crate::types::ExternalMetrics,
    ) -> Result<()>
    where
        WS: WorkloadStore,
        WU: WorkloadUpdater,
    {
        let now = clock.now_millis();

        let mut unready_total: i64 = 0;
        let mut ready_metrics_all = Vec::new();
        let mut current_total: i64 = 0;

        for (backend, collector) in self.packer.config.params.iter().zip(self.collectors.iter_mut()) {
            let (unready, ready) = collector.update_metrics(&backend.target, now).await?;
            unready_total += unready;
            ready_metrics_all.extend(ready);

            let workload = store
                .get_workload(&backend.target)
                .await?
                .ok_or_else(|| AutoscalerError::NotFound(backend.target.id()))?;
            current_total += workload.replicas;
        }

        let bounds_total = crate::types::Bounds {
            min: self.packer.config.total_min(),
            max: self.packer.config.total_max(),
        };

        let (recommended_total, skip) = crate::recommend::recommend(
            &bounds_total,
            current_total,
            self.policy.tolerance,
            &self.policy.metric_targets,
            unready_total,
            &ready_metrics_all,
            external_metrics,
        );
        if skip {
            return Ok(());
        }

        if crate::correct::should_enter_panic(
            recommended_total,
            current_total,
            &self.policy.behavior.scale_up.panic_policy,
        ) {
            self.status.refresh_panic_mode(now);
        }
        let is_panic = self.status.is_panic_mode(now);

        let corrected_total = crate::correct::correct(
            recommended_total,
            current_total,
            &bounds_total,
            &self.policy.behavior,
            &mut self.status.history,
            is_panic,
            now,
        );
        self.status.history.append(now, recommended_total, corrected_total);

        let allocation = self.packer.assign(corrected_total);
        self.packer.apply(&allocation, store, updater).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::Workload;
    use crate::types::{BackendParams, Target};
    use async_trait::async_trait;
    use std::collections::HashMap as Map;
    use std::sync::Mutex;

    fn target(name: &str) -> Target {
        Target {
            namespace: "default".to_string(),
            name: name.to_string(),
            kind: "ModelServing".to_string(),
            match_labels: Map::new(),
            port: 9090,
            uri: "/metrics".to_string(),
        }
    }

    fn s6_config() -> OptimizerConfiguration {
        OptimizerConfiguration {
            params: vec![
                BackendParams {
                    target: target("a"),
                    min_replicas: 0,
                    max_replicas: 3,
                    cost: 1.0,
                },
                BackendParams {
                    target: target("b"),
                    min_replicas: 0,
                    max_replicas: 3,
                    cost: 10.0,
                },
            ],
            cost_expansion_rate_percent: 200,
        }
    }

    #[test]
    fn s6_cheapest_backend_fills_first() {
        let optimizer = Optimizer::new(s6_config());
        let allocation = optimizer.assign(4);
        assert_eq!(allocation.get("default/a"), Some(&3));
        assert_eq!(allocation.get("default/b"), Some(&1));
    }

    #[test]
    fn completeness_sum_matches_clamped_total_within_bounds() {
        let optimizer = Optimizer::new(s6_config());
        for total in [-5, 0, 2, 4, 6, 100] {
            let allocation = optimizer.assign(total);
            let sum: i64 = allocation.values().sum();
            let clamped = total.clamp(0, 6);
            assert_eq!(sum, clamped);
            for backend in &optimizer.config.params {
                let replicas = allocation[&backend.target.id()];
                assert!(replicas >= backend.min_replicas);
                assert!(replicas <= backend.max_replicas);
            }
        }
    }

    #[test]
    fn equal_cost_blocks_prefer_lower_backend_index() {
        let config = OptimizerConfiguration {
            params: vec![
                BackendParams {
                    target: target("a"),
                    min_replicas: 0,
                    max_replicas: 2,
                    cost: 5.0,
                },
                BackendParams {
                    target: target("b"),
                    min_replicas: 0,
                    max_replicas: 2,
                    cost: 5.0,
                },
            ],
            cost_expansion_rate_percent: 100,
        };
        let optimizer = Optimizer::new(config);
        let allocation = optimizer.assign(1);
        assert_eq!(allocation.get("default/a"), Some(&1));
        assert_eq!(allocation.get("default/b"), Some(&0));
    }

    struct InMemoryWorkloads(Mutex<Map<String, Workload>>);

    #[async_trait]
    impl WorkloadStore for InMemoryWorkloads {
        async fn get_workload(
            &self,
            target: &Target,
        ) -> Result<Option<Workload>> {
            Ok(self.0.lock().unwrap().get(&target.id()).cloned())
        }
    }

    #[async_trait]
    impl WorkloadUpdater for InMemoryWorkloads {
        async fn update_replicas(
            &self,
            target: &Target,
            _resource_version: &str,
            replicas: i64,
        ) -> Result<()> {
            self.0
                .lock()
                .unwrap()
                .entry(target.id())
                .and_modify(|w| w.replicas = replicas)
                .or_insert(Workload {
                    resource_version: "1".to_string(),
                    replicas,
                });
            Ok(())
        }
    }

    #[tokio::test]
    async fn apply_writes_only_changed_backends() {
        let optimizer = Optimizer::new(s6_config());
        let allocation = optimizer.assign(4);
        let mut seed = Map::new();
        seed.insert(
            "default/a".to_string(),
            Workload {
                resource_version: "1".to_string(),
                replicas: 3,
            },
        );
        seed.insert(
            "default/b".to_string(),
            Workload {
                resource_version: "1".to_string(),
                replicas: 0,
            },
        );
        let store = InMemoryWorkloads(Mutex::new(seed));
        optimizer.apply(&allocation, &store, &store).await.unwrap();
        let final_state = store.0.lock().unwrap();
        assert_eq!(final_state["default/a"].replicas, 3);
        assert_eq!(final_state["default/b"].replicas, 1);
    }
}
