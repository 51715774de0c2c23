//! The reconciliation loop: owns the per-binding scaler/optimizer cache,
//! runs a fixed-cadence tick over every binding in a namespace, and
//! garbage-collects entries whose binding disappeared.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::clock::Clock;
use crate::collector::MetricCollector;
use crate::error::Result;
use crate::optimizer::OptimizingAutoscaler;
use crate::scaler::Autoscaler;
use crate::traits::{
    Binding, BindingSpec, BindingStore, InstanceLister, MetricScraper, PolicyStore, WorkloadStore,
    WorkloadUpdater,
};
use crate::types::ExternalMetrics;

enum BindingHandle<L, S> {
    Scaling(Autoscaler<L, S>),
    Optimizing(OptimizingAutoscaler<L, S>),
}

fn live_keys_for(binding: &Binding) -> Vec<String> {
    match &binding.spec {
        BindingSpec::Scaling { target } => vec![format!("{}#{}", binding.name, target.name)],
        BindingSpec::Optimizing { .. } => vec![binding.name.clone()],
    }
}

/// Periodically reconciles every binding in one namespace. Per-binding
/// state (the scaler/optimizer cache) is only ever touched by whoever
/// calls [`Reconciler::tick`] — there is no internal locking, since a
/// single task owns the whole reconcile loop.
pub struct Reconciler<L, S, WS, WU, PS, BS> {
    namespace: String,
    policy_store: Arc<PS>,
    binding_store: Arc<BS>,
    workload_store: Arc<WS>,
    workload_updater: Arc<WU>,
    instance_lister: Arc<L>,
    metric_scraper: Arc<S>,
    slo_percentile: f64,
    histogram_fresh_ms: i64,
    histogram_expire_ms: i64,
    cache: HashMap<String, BindingHandle<L, S>>,
}

impl<L, S, WS, WU, PS, BS> Reconciler<L, S, WS, WU, PS, BS>
where
    L: InstanceLister,
    S: MetricScraper,
    WS: WorkloadStore,
    WU: WorkloadUpdater,
    PS: PolicyStore,
    BS: BindingStore,
{
    /// Build a reconciler for `namespace`. `slo_percentile` and the
    /// histogram window parameters are ambient collector configuration,
    /// shared by every binding's collector.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        namespace: String,
        policy_store: Arc<PS>,
        binding_store: Arc<BS>,
        workload_store: Arc<WS>,
        workload_updater: Arc<WU>,
        instance_lister: Arc<L>,
        metric_scraper: Arc<S>,
        slo_percentile: f64,
        histogram_fresh_ms: i64,
        histogram_expire_ms: i64,
    ) -> Self {
        Self {
            namespace,
            policy_store,
            binding_store,
            workload_store,
            workload_updater,
            instance_lister,
            metric_scraper,
            slo_percentile,
            histogram_fresh_ms,
            histogram_expire_ms,
            cache: HashMap::new(),
        }
    }

    /// Number of cached scaler/optimizer entries. Exposed for tests and
    /// for the binary's own self-observability gauges.
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Run one tick: list bindings, garbage-collect stale cache entries,
    /// then resolve and invoke each binding. A single binding's failure is
    /// logged and does not abort the tick.
    pub async fn tick(&mut self, clock: &dyn Clock, external_metrics: &ExternalMetrics) -> Result<()> {
        let bindings = self.binding_store.list_bindings(&self.namespace).await?;

        let mut live_keys = HashSet::new();
        for binding in &bindings {
            live_keys.extend(live_keys_for(binding));
        }
        self.cache.retain(|key, _| live_keys.contains(key));

        for binding in &bindings {
            if let Err(e) = self.reconcile_binding(binding, clock, external_metrics).await {
                tracing::error!(binding = %binding.name, error = %e, "binding reconcile failed");
            }
        }
        Ok(())
    }

    fn new_collector(&self, watched: Vec<String>) -> MetricCollector<L, S> {
        MetricCollector::new(
            self.instance_lister.clone(),
            self.metric_scraper.clone(),
            watched,
            self.slo_percentile,
            self.histogram_fresh_ms,
            self.histogram_expire_ms,
        )
    }

    async fn reconcile_binding(
        &mut self,
        binding: &Binding,
        clock: &dyn Clock,
        external_metrics: &ExternalMetrics,
    ) -> Result<()> {
        let policy = match self
            .policy_store
            .get_policy(&self.namespace, &binding.policy_name)
            .await?
        {
            Some(p) => p,
            None => {
                tracing::warn!(binding = %binding.name, policy = %binding.policy_name, "policy not found; skipping binding");
                return Ok(());
            }
        };

        match &binding.spec {
            BindingSpec::Scaling { target } => {
                let key = format!("{}#{}", binding.name, target.name);
                if !self.cache.contains_key(&key) {
                    let watched: Vec<String> = policy.metric_targets.keys().cloned().collect();
                    let collector = self.new_collector(watched);
                    let autoscaler = Autoscaler::new(target.clone(), policy, collector);
                    self.cache.insert(key.clone(), BindingHandle::Scaling(autoscaler));
                }
                if let Some(BindingHandle::Scaling(autoscaler)) = self.cache.get_mut(&key) {
                    autoscaler
                        .scale(
                            clock,
                            self.workload_store.as_ref(),
                            self.workload_updater.as_ref(),
                            external_metrics,
                        )
                        .await?;
                }
            }
            BindingSpec::Optimizing { optimizer } => {
                let key = binding.name.clone();
                if !self.cache.contains_key(&key) {
                    let watched: Vec<String> = policy.metric_targets.keys().cloned().collect();
                    let collectors = optimizer
                        .params
                        .iter()
                        .map(|_| self.new_collector(watched.clone()))
                        .collect();
                    let handle = OptimizingAutoscaler::new(policy, optimizer.clone(), collectors);
                    self.cache.insert(key.clone(), BindingHandle::Optimizing(handle));
                }
                if let Some(BindingHandle::Optimizing(handle)) = self.cache.get_mut(&key) {
                    handle
                        .run(
                            clock,
                            self.workload_store.as_ref(),
                            self.workload_updater.as_ref(),
                            external_metrics,
                        )
                        .await?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;
    use crate::traits::{Instance, Workload};
    use crate::types::{
        Bounds, ScaleDownPolicy, ScaleUpBehavior, ScaleUpPanicPolicy, ScaleUpStablePolicy,
        SelectPolicy, Target,
    };
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn target(name: &str) -> Target {
        Target {
            namespace: "default".to_string(),
            name: name.to_string(),
            kind: "ModelServing".to_string(),
            match_labels: HashMap::new(),
            port: 9090,
            uri: "/metrics".to_string(),
        }
    }

    fn policy() -> crate::types::Policy {
        crate::types::Policy {
            bounds: Bounds { min: 1, max: 100 },
            tolerance: 0.1,
            metric_targets: [("qps".to_string(), 10.0)].into_iter().collect(),
            behavior: crate::types::Behavior {
                scale_down: ScaleDownPolicy {
                    period_ms: 60_000,
                    stabilization_window_ms: 0,
                    instances: 10,
                    percent: 100,
                    select_policy: SelectPolicy::Or,
                },
                scale_up: ScaleUpBehavior {
                    stable_policy: ScaleUpStablePolicy {
                        period_ms: 60_000,
                        stabilization_window_ms: 0,
                        instances: 10,
                        percent: 100,
                        select_policy: SelectPolicy::Or,
                    },
                    panic_policy: ScaleUpPanicPolicy {
                        period_ms: 15_000,
                        threshold_percent: 150,
                        hold_ms: 10_000,
                        percent: 100,
                    },
                },
            },
        }
    }

    struct FixedPolicies(Mutex<HashMap<String, crate::types::Policy>>);

    #[async_trait]
    impl PolicyStore for FixedPolicies {
        async fn get_policy(
            &self,
            _namespace: &str,
            name: &str,
        ) -> Result<Option<crate::types::Policy>> {
            Ok(self.0.lock().unwrap().get(name).cloned())
        }
    }

    struct FixedBindings(Mutex<Vec<Binding>>);

    #[async_trait]
    impl BindingStore for FixedBindings {
        async fn list_bindings(&self, _namespace: &str) -> Result<Vec<Binding>> {
            Ok(self.0.lock().unwrap().clone())
        }
    }

    struct InMemoryWorkloads(Mutex<HashMap<String, Workload>>);

    #[async_trait]
    impl WorkloadStore for InMemoryWorkloads {
        async fn get_workload(&self, target: &Target) -> Result<Option<Workload>> {
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

    struct FixedLister(Vec<Instance>);

    #[async_trait]
    impl InstanceLister for FixedLister {
        async fn list_instances(&self, _target: &Target) -> Result<Vec<Instance>> {
            Ok(self.0.clone())
        }
    }

    struct FixedScraper(String);

    #[async_trait]
    impl MetricScraper for FixedScraper {
        async fn scrape(&self, _ip: &str, _port: u16, _uri: &str) -> Result<String> {
            Ok(self.0.clone())
        }
    }

    fn instance(id: &str) -> Instance {
        Instance {
            id: id.to_string(),
            ip: id.to_string(),
            ready: true,
            terminal_phase: false,
            deletion_requested: false,
            restart_count: 0,
            start_time_ms: 0,
        }
    }

    fn new_reconciler(
        bindings: Vec<Binding>,
        policies: HashMap<String, crate::types::Policy>,
        workloads: HashMap<String, Workload>,
    ) -> (
        Reconciler<FixedLister, FixedScraper, InMemoryWorkloads, InMemoryWorkloads, FixedPolicies, FixedBindings>,
        Arc<InMemoryWorkloads>,
    ) {
        let workload_store = Arc::new(InMemoryWorkloads(Mutex::new(workloads)));
        let reconciler = Reconciler::new(
            "default".to_string(),
            Arc::new(FixedPolicies(Mutex::new(policies))),
            Arc::new(FixedBindings(Mutex::new(bindings))),
            workload_store.clone(),
            workload_store.clone(),
            Arc::new(FixedLister(vec![instance("a")])),
            Arc::new(FixedScraper("# TYPE qps counter\nqps 10\n".to_string())),
            99.0,
            60_000,
            600_000,
        );
        (reconciler, workload_store)
    }

    #[tokio::test]
    async fn tick_creates_a_cache_entry_for_a_new_binding() {
        let binding = Binding {
            namespace: "default".to_string(),
            name: "demo".to_string(),
            policy_name: "demo-policy".to_string(),
            spec: BindingSpec::Scaling {
                target: target("workload-a"),
            },
        };
        let mut policies = HashMap::new();
        policies.insert("demo-policy".to_string(), policy());
        let mut workloads = HashMap::new();
        workloads.insert(
            "default/workload-a".to_string(),
            Workload {
                resource_version: "1".to_string(),
                replicas: 1,
            },
        );
        let (mut reconciler, _store) = new_reconciler(vec![binding], policies, workloads);

        let clock = FakeClock::new(0);
        reconciler.tick(&clock, &HashMap::new()).await.unwrap();
        assert_eq!(reconciler.cache_len(), 1);
    }

    #[tokio::test]
    async fn gc_removes_entries_for_bindings_no_longer_present() {
        let binding = Binding {
            namespace: "default".to_string(),
            name: "demo".to_string(),
            policy_name: "demo-policy".to_string(),
            spec: BindingSpec::Scaling {
                target: target("workload-a"),
            },
        };
        let mut policies = HashMap::new();
        policies.insert("demo-policy".to_string(), policy());
        let mut workloads = HashMap::new();
        workloads.insert(
            "default/workload-a".to_string(),
            Workload {
                resource_version: "1".to_string(),
                replicas: 1,
            },
        );
        let (mut reconciler, _store) = new_reconciler(vec![binding], policies, workloads);

        let clock = FakeClock::new(0);
        reconciler.tick(&clock, &HashMap::new()).await.unwrap();
        assert_eq!(reconciler.cache_len(), 1);

        reconciler.binding_store = Arc::new(FixedBindings(Mutex::new(vec![])));
        reconciler.tick(&clock, &HashMap::new()).await.unwrap();
        assert_eq!(reconciler.cache_len(), 0);
    }

    #[tokio::test]
    async fn missing_policy_skips_binding_without_failing_the_tick() {
        let binding = Binding {
            namespace: "default".to_string(),
            name: "demo".to_string(),
            policy_name: "does-not-exist".to_string(),
            spec: BindingSpec::Scaling {
                target: target("workload-a"),
            },
        };
        let (mut reconciler, _store) = new_reconciler(vec![binding], HashMap::new(), HashMap::new());

        let clock = FakeClock::new(0);
        reconciler.tick(&clock, &HashMap::new()).await.unwrap();
        assert_eq!(reconciler.cache_len(), 0);
    }
}
