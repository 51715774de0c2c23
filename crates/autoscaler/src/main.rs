//! Entry point: wires CLI flags, the seed-data config, the in-process
//! store implementations and the reconciler into a running tick loop.
//!
//! The tick loop's start/stop shape follows `knhk-autonomic`'s
//! `AutonomicController::start` — a `tokio::time::interval` driving a
//! cycle whose failure is logged, not propagated, so one bad tick never
//! takes the process down — generalized here to also honor a per-tick
//! deadline and a graceful-shutdown signal.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

mod cli;
mod config;
mod stubs;
mod telemetry;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;

use autoscaler_core::clock::SystemClock;
use autoscaler_core::reconciler::Reconciler;

use crate::cli::Cli;
use crate::config::AppConfig;
use crate::stubs::{InMemoryCluster, ReqwestScraper};
use crate::telemetry::Metrics;

#[tokio::main]
async fn main() {
    telemetry::init_tracing();

    let cli = Cli::parse();
    let app_config = match AppConfig::load(&cli) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "failed to load configuration");
            std::process::exit(1);
        }
    };

    if cli.leader_election {
        // Leader election lives outside this binary. It assumes it already
        // holds the lease named by `--lease-name`; acquiring and renewing
        // it is a wrapper concern left to the deployment, not the
        // reconcile loop.
        tracing::info!(lease = %cli.lease_name, "leader election requested; assuming lease is held");
    }

    tracing::info!(
        namespace = %app_config.namespace,
        sync_period = ?app_config.sync_period,
        bindings = app_config.bindings.len(),
        policies = app_config.policies.len(),
        "starting autoscaler"
    );

    let metrics_port = app_config.metrics_port;
    tokio::spawn(telemetry::serve_metrics(metrics_port));

    let cluster = Arc::new(InMemoryCluster::new(
        app_config.policies,
        app_config.bindings,
        app_config.workloads,
        app_config.instances,
    ));
    let scraper = match ReqwestScraper::new(app_config.tick_timeout) {
        Ok(scraper) => Arc::new(scraper),
        Err(e) => {
            tracing::error!(error = %e, "failed to build metric scraper");
            std::process::exit(1);
        }
    };

    let mut reconciler = Reconciler::new(
        app_config.namespace,
        cluster.clone(),
        cluster.clone(),
        cluster.clone(),
        cluster.clone(),
        cluster.clone(),
        scraper,
        app_config.slo_percentile,
        app_config.histogram_fresh_ms,
        app_config.histogram_expire_ms,
    );

    let clock = SystemClock;
    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutdown signal received");
                running.store(false, Ordering::SeqCst);
            }
        });
    }

    let mut ticker = tokio::time::interval(app_config.sync_period);
    let external_metrics = HashMap::new();

    while running.load(Ordering::SeqCst) {
        ticker.tick().await;
        if !running.load(Ordering::SeqCst) {
            break;
        }

        let started = Instant::now();
        let result =
            tokio::time::timeout(app_config.tick_timeout, reconciler.tick(&clock, &external_metrics))
                .await;
        let elapsed = started.elapsed();
        Metrics::global().tick_duration.observe(elapsed.as_secs_f64());
        Metrics::global().cache_size.set(reconciler.cache_len() as i64);

        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                Metrics::global().tick_errors.inc();
                tracing::error!(error = %e, "tick failed");
            }
            Err(_) => {
                Metrics::global().tick_errors.inc();
                tracing::error!(timeout = ?app_config.tick_timeout, "tick exceeded deadline");
            }
        }
    }

    tracing::info!("autoscaler stopped");
}
