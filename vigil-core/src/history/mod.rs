//! Metric history synchronization.
//!
//! Pulls windowed range queries from the metrics backend, reconciles the
//! raw result series into one dense per-timestamp series per metric, and
//! persists a JSON snapshot per window so the presentation layer can render
//! history charts.
//!
//! A pass is all-or-nothing: if any configured metric fails to fetch or
//! reconcile, nothing is written and the previous snapshot keeps being
//! served. A consumer reading a half-updated snapshot is worse than one
//! reading a stale but internally consistent snapshot.

pub mod fetch;
pub mod reconcile;
pub mod scheduler;
pub mod snapshot;

pub use fetch::{QueryStatus, RangeClient, RangeQuery, RawQueryResult, RawSeries};
pub use reconcile::{reconcile, ReconciledSeries};
pub use scheduler::HistoryScheduler;
pub use snapshot::{HistorySnapshotBuilder, Snapshot};
