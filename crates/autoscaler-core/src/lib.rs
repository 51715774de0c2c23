//! Recommendation, correction and reconciliation core for the
//! inference-workload autoscaler.
//!
//! This crate is the algorithmic heart of the autoscaler: sliding windows,
//! a histogram-quantile-on-diff helper, a metric collector, the pure
//! recommendation and correction algorithms, the homogeneous scaler, the
//! multi-backend optimizer, and the reconciler that drives all of the
//! above over a namespace's worth of bindings. Everything deliberately
//! kept out of this crate — leader election, CLI parsing, generated typed
//! clients/informers — lives one layer up, in the `autoscaler` binary
//! crate, behind the traits in [`traits`].

pub mod clock;
pub mod collector;
pub mod correct;
pub mod error;
pub mod histogram;
pub mod optimizer;
pub mod recommend;
pub mod reconciler;
pub mod scaler;
pub mod status;
pub mod traits;
pub mod types;
pub mod window;

pub use error::{AutoscalerError, Result};
