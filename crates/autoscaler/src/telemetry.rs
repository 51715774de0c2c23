//! Structured logging and self-metrics for the reconciler process itself,
//! as distinct from the cluster-facing metrics plumbing the scrape
//! collector reads.
//!
//! Logging follows `knhk-cli`'s `init_tracing`: an `EnvFilter` driven by an
//! environment variable, layered onto a plain `fmt` subscriber. The OTLP
//! exporter half of that function is dropped — this binary has no
//! OpenTelemetry dependency in its stack — leaving the always-available
//! local-fmt path as the only mode, simplified rather than feature-gated.
//!
//! Self-metrics use the `prometheus` crate's default registry and are
//! served over a minimal hand-rolled HTTP endpoint, since no HTTP server
//! framework is part of this stack.

use std::sync::OnceLock;

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the global tracing subscriber. Reads `AUTOSCALER_LOG`
/// (falling back to `info`), matching `knhk-cli`'s `KNHK_TRACE` convention.
pub fn init_tracing() {
    let level = std::env::var("AUTOSCALER_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .init();
}

/// Self-metrics for the reconcile loop: cache size, tick latency, and
/// per-tick error count.
pub struct Metrics {
    registry: Registry,
    /// Number of cached scaler/optimizer entries, sampled after each tick.
    pub cache_size: IntGauge,
    /// Wall-clock duration of each `Reconciler::tick` call.
    pub tick_duration: Histogram,
    /// Count of ticks that returned an error.
    pub tick_errors: IntCounter,
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

impl Metrics {
    /// Metric names and help strings below are static literals.
    #[allow(clippy::expect_used)]
    fn new() -> Self {
        let registry = Registry::new();
        let cache_size = IntGauge::new(
            "autoscaler_cache_size",
            "Number of cached scaler/optimizer entries",
        )
        .expect("static metric name and help are valid");
        let tick_duration = Histogram::with_opts(HistogramOpts::new(
            "autoscaler_tick_duration_seconds",
            "Duration of one reconcile tick",
        ))
        .expect("static metric name and help are valid");
        let tick_errors = IntCounter::new(
            "autoscaler_tick_errors_total",
            "Number of reconcile ticks that returned an error",
        )
        .expect("static metric name and help are valid");

        registry
            .register(Box::new(cache_size.clone()))
            .expect("metric registered once");
        registry
            .register(Box::new(tick_duration.clone()))
            .expect("metric registered once");
        registry
            .register(Box::new(tick_errors.clone()))
            .expect("metric registered once");

        Self {
            registry,
            cache_size,
            tick_duration,
            tick_errors,
        }
    }

    /// The process-wide metrics instance, created on first use.
    pub fn global() -> &'static Metrics {
        METRICS.get_or_init(Metrics::new)
    }

    #[allow(clippy::expect_used)]
    fn render(&self) -> Vec<u8> {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        let families = self.registry.gather();
        encoder
            .encode(&families, &mut buffer)
            .expect("text encoding of gathered metric families cannot fail");
        buffer
    }
}

/// Serve the Prometheus text-exposition format on `GET /metrics` until the
/// process exits. Spawned as a background task; a bind failure is logged
/// and the task exits rather than aborting the whole process, since
/// self-metrics are not load-bearing for the reconcile loop itself.
pub async fn serve_metrics(port: u16) {
    let listener = match TcpListener::bind(("0.0.0.0", port)).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(port, error = %e, "failed to bind metrics listener");
            return;
        }
    };
    tracing::info!(port, "serving self-metrics");

    loop {
        let (mut socket, _) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::warn!(error = %e, "failed to accept metrics connection");
                continue;
            }
        };
        tokio::spawn(async move {
            let mut buf = [0u8; 1024];
            if socket.read(&mut buf).await.is_err() {
                return;
            }
            let body = Metrics::global().render();
            let header = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: text/plain; version=0.0.4\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            let _ = socket.write_all(header.as_bytes()).await;
            let _ = socket.write_all(&body).await;
        });
    }
}
