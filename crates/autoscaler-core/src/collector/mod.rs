//! Per-target metric collection: scrape ready instances, parse their
//! exposition, aggregate counters/gauges, derive histogram quantiles by
//! diffing against the previous scrape, and classify readiness/failure.

pub mod parse;

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::AutoscalerError;
use crate::histogram::{self, Snapshot};
use crate::traits::{InstanceLister, MetricScraper};
use crate::types::InstanceMetrics;
use crate::window::SnapshotWindow;

use parse::{MetricFamily, MetricFamilyParser, PrometheusTextParser};

/// Per-instance histogram state retained across scrapes, keyed by metric
/// name. `start_time_ms` invalidates the state when an instance restarts.
#[derive(Debug, Clone, Default)]
struct InstanceHistogramState {
    start_time_ms: i64,
    snapshots: HashMap<String, Snapshot>,
}

type PerInstanceHistograms = HashMap<String, InstanceHistogramState>;

/// Collects and aggregates metrics for one [`crate::types::Target`].
pub struct MetricCollector<L, S, P = PrometheusTextParser> {
    lister: Arc<L>,
    scraper: Arc<S>,
    parser: P,
    watched_metrics: Vec<String>,
    slo_percentile: f64,
    histogram_window: SnapshotWindow<PerInstanceHistograms>,
}

impl<L, S> MetricCollector<L, S, PrometheusTextParser>
where
    L: InstanceLister,
    S: MetricScraper,
{
    /// Build a collector using the standard Prometheus text parser.
    pub fn new(
        lister: Arc<L>,
        scraper: Arc<S>,
        watched_metrics: Vec<String>,
        slo_percentile: f64,
        histogram_fresh_ms: i64,
        histogram_expire_ms: i64,
    ) -> Self {
        Self::with_parser(
            lister,
            scraper,
            PrometheusTextParser,
            watched_metrics,
            slo_percentile,
            histogram_fresh_ms,
            histogram_expire_ms,
        )
    }
}

impl<L, S, P> MetricCollector<L, S, P>
where
    L: InstanceLister,
    S: MetricScraper,
    P: MetricFamilyParser,
{
    /// Build a collector with a caller-supplied exposition parser.
    pub fn with_parser(
        lister: Arc<L>,
        scraper: Arc<S>,
        parser: P,
        watched_metrics: Vec<String>,
        slo_percentile: f64,
        histogram_fresh_ms: i64,
        histogram_expire_ms: i64,
    ) -> Self {
        Self {
            lister,
            scraper,
            parser,
            watched_metrics,
            slo_percentile,
            histogram_window: SnapshotWindow::new(histogram_fresh_ms, histogram_expire_ms),
        }
    }

    /// Scrape every ready instance of `target` and return
    /// `(unready_count, ready_instance_metrics)`.
    pub async fn update_metrics(
        &mut self,
        target: &crate::types::Target,
        now: i64,
    ) -> Result<(i64, Vec<InstanceMetrics>), AutoscalerError> {
        let instances = self.lister.list_instances(target).await?;
        if instances.is_empty() {
            tracing::warn!(target = %target.id(), "no instances found for target");
            return Ok((0, Vec::new()));
        }

        if instances.iter().any(|i| i.is_failed()) {
            tracing::warn!(target = %target.id(), "target has a failed instance; skipping this tick");
            return Ok((0, Vec::new()));
        }

        let prior = self.histogram_window.get_last_unfresh_snapshot(now).cloned();

        let mut unready_count: i64 = 0;
        let mut ready_metrics = Vec::with_capacity(instances.len());
        let mut new_histograms: PerInstanceHistograms = HashMap::new();

        for instance in &instances {
            if !instance.ready {
                unready_count += 1;
                continue;
            }

            let body = match self.scraper.scrape(&instance.ip, target.port, &target.uri).await {
                Ok(b) if !b.is_empty() => b,
                Ok(_) => {
                    tracing::warn!(target = %target.id(), instance = %instance.id, "empty scrape body");
                    continue;
                }
                Err(e) => {
                    tracing::warn!(target = %target.id(), instance = %instance.id, error = %e, "scrape failed");
                    continue;
                }
            };

            let families = match self.parser.parse(&body) {
                Ok(f) => f,
                Err(reason) => {
                    tracing::warn!(target = %target.id(), instance = %instance.id, %reason, "failed to parse scrape body");
                    continue;
                }
            };

            let mut metric_map: InstanceMetrics = HashMap::new();
            let mut instance_snapshots: HashMap<String, Snapshot> = HashMap::new();

            for family in families {
                match family {
                    MetricFamily::Counter { name, samples } | MetricFamily::Gauge { name, samples } => {
                        if !self.watched_metrics.iter().any(|m| m == &name) {
                            continue;
                        }
                        let total: f64 = samples.iter().map(|s| s.value).sum();
                        *metric_map.entry(name).or_insert(0.0) += total;
                    }
                    MetricFamily::Histogram {
                        name,
                        buckets,
                        sum,
                        count,
                    } => {
                        if !self.watched_metrics.iter().any(|m| m == &name) {
                            continue;
                        }
                        let snapshot = Snapshot::new(
                            sum,
                            count as i64,
                            buckets
                                .into_iter()
                                .map(|(upper_bound, cumulative_count)| histogram::Bucket {
                                    upper_bound,
                                    cumulative_count: cumulative_count as i64,
                                })
                                .collect(),
                        );

                        let past = prior
                            .as_ref()
                            .and_then(|p| p.get(&instance.id))
                            .filter(|state| state.start_time_ms == instance.start_time_ms)
                            .and_then(|state| state.snapshots.get(&name))
                            .cloned()
                            .unwrap_or_default();

                        match histogram::quantile_in_diff(self.slo_percentile, &snapshot, &past) {
                            Ok(v) => {
                                metric_map.insert(name.clone(), v);
                            }
                            Err(reason) => {
                                tracing::warn!(target = %target.id(), instance = %instance.id, metric = %name, error = %reason, "histogram quantile failed");
                            }
                        }
                        instance_snapshots.insert(name, snapshot);
                    }
                }
            }

            for watched in &self.watched_metrics {
                metric_map.entry(watched.clone()).or_insert(0.0);
            }

            new_histograms.insert(
                instance.id.clone(),
                InstanceHistogramState {
                    start_time_ms: instance.start_time_ms,
                    snapshots: instance_snapshots,
                },
            );
            ready_metrics.push(metric_map);
        }

        self.histogram_window.append(now, new_histograms);
        Ok((unready_count, ready_metrics))
    }
}
