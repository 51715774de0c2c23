//! Error taxonomy for the autoscaler core.

use thiserror::Error;

/// Result type for autoscaler operations.
pub type Result<T> = std::result::Result<T, AutoscalerError>;

/// Errors that can occur while collecting metrics, reconciling bindings or
/// applying a replica update.
///
/// Pure computations (recommendation, correction, the sliding windows) never
/// return this type: they are total functions that at most fall back to
/// `skip = true` or to the current replica count. This type is only
/// surfaced by components that touch I/O.
#[derive(Error, Debug)]
pub enum AutoscalerError {
    /// A policy or binding failed validation (bad percentile, inconsistent
    /// bounds, negative replica counts, unknown select policy).
    #[error("invalid policy: {0}")]
    InvalidPolicy(String),

    /// Scraping an instance's metric endpoint failed (network error,
    /// non-2xx, empty body). Tolerated per-instance by the collector.
    #[error("scrape failed for {target}: {reason}")]
    Scrape {
        /// Human-readable target identifier (namespace/name/instance).
        target: String,
        /// Underlying failure reason.
        reason: String,
    },

    /// A control-plane list/get call failed or the informer cache was not
    /// yet synced.
    #[error("sync error: {0}")]
    Sync(String),

    /// A workload update was rejected due to a stale resource version.
    #[error("conflict updating {workload}: {reason}")]
    Conflict {
        /// Workload that failed to update.
        workload: String,
        /// Underlying failure reason.
        reason: String,
    },

    /// A histogram snapshot pair was structurally inconsistent (mismatched
    /// bucket arrays, non-monotone cumulative counts).
    #[error("histogram error: {0}")]
    Histogram(#[from] HistogramError),

    /// A referenced object (policy, binding, workload) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Generic I/O or aggregation failure at the process boundary.
    #[error("autoscaler error: {0}")]
    Other(#[from] anyhow::Error),
}

/// Errors specific to histogram-quantile computation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HistogramError {
    /// A precondition of `quantile_in_diff` was violated (percentile out of
    /// `[1, 100]`, mismatched bucket array lengths).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The bucket walk exited without locating the target rank. Should not
    /// occur when `Δ > 0` and buckets are well-formed; surfaced rather than
    /// panicking so a single malformed instance cannot take down a scrape.
    #[error("target rank not found in buckets")]
    NotFound,
}
