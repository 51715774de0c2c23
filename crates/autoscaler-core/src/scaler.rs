//! The homogeneous autoscaler: scales one workload by running
//! collect → recommend → panic-refresh → correct → apply in order.

use crate::clock::Clock;
use crate::collector::MetricCollector;
use crate::correct::{correct, should_enter_panic};
use crate::error::{AutoscalerError, Result};
use crate::recommend::recommend;
use crate::status::Status;
use crate::traits::{InstanceLister, MetricScraper, WorkloadStore, WorkloadUpdater};
use crate::types::{ExternalMetrics, Policy, Target};

/// Owns one [`MetricCollector`] and one [`Status`] bound to a single
/// [`Target`].
pub struct Autoscaler<L, S> {
    target: Target,
    policy: Policy,
    collector: MetricCollector<L, S>,
    status: Status,
}

impl<L, S> Autoscaler<L, S>
where
    L: InstanceLister,
    S: MetricScraper,
{
    /// Build a new autoscaler for `target`, seeding fresh history windows
    /// from `policy`'s behavior.
    pub fn new(target: Target, policy: Policy, collector: MetricCollector<L, S>) -> Self {
        let status = Status::new(&policy.behavior);
        Self {
            target,
            policy,
            collector,
            status,
        }
    }

    /// Replace the policy in place, rebuilding history windows (a policy
    /// update changes freshness parameters, so stale windows cannot be
    /// reused across the swap).
    pub fn set_policy(&mut self, policy: Policy) {
        self.status = Status::new(&policy.behavior);
        self.policy = policy;
    }

    /// Run one full scale cycle: collect metrics, recommend, correct, and
    /// write back a changed replica count.
    pub async fn scale<WS, WU>(
        &mut self,
        clock: &dyn Clock,
        store: &WS,
        updater: &WU,
        external_metrics: &ExternalMetrics,
    ) -> Result<()>
    where
        WS: WorkloadStore,
        WU: WorkloadUpdater,
    {
        let now = clock.now_millis();
        let (unready_count, ready_metrics) = self.collector.update_metrics(&self.target, now).await?;

        let workload = store
            .get_workload(&self.target)
            .await?
            .ok_or_else(|| AutoscalerError::NotFound(self.target.id()))?;
        let current = workload.replicas;

        let (recommended, skip) = recommend(
            &self.policy.bounds,
            current,
            self.policy.tolerance,
            &self.policy.metric_targets,
            unready_count,
            &ready_metrics,
            external_metrics,
        );
        if skip {
            return Ok(());
        }

        if should_enter_panic(recommended, current, &self.policy.behavior.scale_up.panic_policy) {
            self.status.refresh_panic_mode(now);
        }
        let is_panic = self.status.is_panic_mode(now);

        let corrected = correct(
            recommended,
            current,
            &self.policy.bounds,
            &self.policy.behavior,
            &mut self.status.history,
            is_panic,
            now,
        );
        self.status.history.append(now, recommended, corrected);

        if corrected != current {
            updater
                .update_replicas(&self.target, &workload.resource_version, corrected)
                .await?;
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
        SelectPolicy,
    };
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn target() -> Target {
        Target {
            namespace: "default".to_string(),
            name: "demo".to_string(),
            kind: "ModelServing".to_string(),
            match_labels: HashMap::new(),
            port: 9090,
            uri: "/metrics".to_string(),
        }
    }

    fn policy() -> Policy {
        Policy {
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

    struct InMemoryWorkload(Mutex<Workload>);

    #[async_trait]
    impl WorkloadStore for InMemoryWorkload {
        async fn get_workload(&self, _target: &Target) -> Result<Option<Workload>> {
            Ok(Some(self.0.lock().unwrap().clone()))
        }
    }

    #[async_trait]
    impl WorkloadUpdater for InMemoryWorkload {
        async fn update_replicas(
            &self,
            _target: &Target,
            _resource_version: &str,
            replicas: i64,
        ) -> Result<()> {
            self.0.lock().unwrap().replicas = replicas;
            Ok(())
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

    #[tokio::test]
    async fn scale_up_writes_back_a_changed_replica_count() {
        let lister = std::sync::Arc::new(FixedLister(vec![instance("a"), instance("b")]));
        let scraper = std::sync::Arc::new(FixedScraper("# TYPE qps counter\nqps 100\n".to_string()));
        let collector = MetricCollector::new(lister, scraper, vec!["qps".to_string()], 99.0, 60_000, 600_000);
        let mut autoscaler = Autoscaler::new(target(), policy(), collector);

        let store = InMemoryWorkload(Mutex::new(Workload {
            resource_version: "1".to_string(),
            replicas: 2,
        }));
        let clock = FakeClock::new(0);

        autoscaler
            .scale(&clock, &store, &store, &HashMap::new())
            .await
            .unwrap();

        let final_replicas = store.0.lock().unwrap().replicas;
        assert!(final_replicas > 2);
    }

    #[tokio::test]
    async fn within_tolerance_leaves_replicas_unchanged() {
        let lister = std::sync::Arc::new(FixedLister(vec![instance("a")]));
        // qps=10 against target 10: ratio exactly 1.0, within 10% tolerance.
        let scraper = std::sync::Arc::new(FixedScraper("# TYPE qps counter\nqps 10\n".to_string()));
        let collector = MetricCollector::new(lister, scraper, vec!["qps".to_string()], 99.0, 60_000, 600_000);
        let mut autoscaler = Autoscaler::new(target(), policy(), collector);

        let store = InMemoryWorkload(Mutex::new(Workload {
            resource_version: "1".to_string(),
            replicas: 1,
        }));
        let clock = FakeClock::new(0);

        autoscaler
            .scale(&clock, &store, &store, &HashMap::new())
            .await
            .unwrap();

        assert_eq!(store.0.lock().unwrap().replicas, 1);
    }
}
