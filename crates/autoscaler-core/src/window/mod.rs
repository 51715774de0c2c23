//! Sliding-window data structures feeding history-based constraints to the
//! correction algorithm.

pub mod linechart;
pub mod record;
pub mod snapshot;

pub use linechart::LineChartWindow;
pub use record::RecordWindow;
pub use snapshot::SnapshotWindow;
