//! Per-window history snapshots.
//!
//! One pass fetches and reconciles every configured metric for a window and
//! persists the combined result as a single JSON file, replaced atomically.
//! The file is only touched when every metric succeeded.

use crate::clock::unix_now;
use crate::config::{MetricQuery, WindowConfig};
use crate::error::{Result, VigilError};
use crate::fsutil;
use crate::history::fetch::RangeQuery;
use crate::history::reconcile::{reconcile, ReconciledSeries};
use crate::observability::metrics as obs;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};

/// All reconciled series of one window pass, keyed by source key.
/// Serializes as `{ "<key>": { "<timestamp>": value } }`.
pub type Snapshot = BTreeMap<String, ReconciledSeries>;

/// Builds and persists history snapshots for one or more windows.
pub struct HistorySnapshotBuilder {
    querier: Arc<dyn RangeQuery>,
    static_dir: PathBuf,
}

impl HistorySnapshotBuilder {
    /// Create a builder writing into `static_dir`.
    pub fn new(querier: Arc<dyn RangeQuery>, static_dir: impl Into<PathBuf>) -> Self {
        Self { querier, static_dir: static_dir.into() }
    }

    /// Path of the snapshot file for a window.
    pub fn snapshot_path(&self, window_name: &str) -> PathBuf {
        self.static_dir.join(format!("{}-history.json", window_name))
    }

    /// Fetch and reconcile every metric of one pass.
    ///
    /// Any single failure aborts the whole pass so a half-updated snapshot
    /// is never produced.
    #[instrument(skip(self, window, metrics), fields(window = %window.name))]
    pub async fn build_snapshot(
        &self,
        window: &WindowConfig,
        metrics: &[MetricQuery],
    ) -> Result<Snapshot> {
        let end = unix_now();
        let start = end - window.lookback_secs as i64;

        let mut snapshot = Snapshot::new();
        for metric in metrics {
            let result = match self
                .querier
                .fetch(&metric.expression, start, end, window.step())
                .await
            {
                Ok(result) => result,
                Err(e) => {
                    warn!(key = %metric.source_key, error = %e, "Range fetch failed, aborting pass");
                    return Err(VigilError::PartialFailure {
                        failed_key: metric.source_key.clone(),
                    });
                }
            };
            let series = match reconcile(metric, &result, window) {
                Ok(series) => series,
                Err(e) => {
                    warn!(key = %metric.source_key, error = %e, "Reconciliation failed, aborting pass");
                    return Err(VigilError::PartialFailure {
                        failed_key: metric.source_key.clone(),
                    });
                }
            };
            snapshot.insert(metric.source_key.clone(), series);
        }

        Ok(snapshot)
    }

    /// Serialize a snapshot and atomically replace the window's file.
    pub async fn write_snapshot(&self, window_name: &str, snapshot: &Snapshot) -> Result<PathBuf> {
        let path = self.snapshot_path(window_name);
        let bytes = serde_json::to_vec(snapshot)
            .map_err(|e| VigilError::Serialize { reason: e.to_string() })?;
        fsutil::write_atomic(&path, &bytes).await?;
        Ok(path)
    }

    /// One full sync pass for one window: build, then persist only on full
    /// success. On failure the previous snapshot file stays untouched.
    pub async fn sync_once(&self, window: &WindowConfig, metrics: &[MetricQuery]) -> Result<()> {
        info!(window = %window.name, "Syncing history");
        let started = Instant::now();

        let snapshot = match self.build_snapshot(window, metrics).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                obs::record_pass(&window.name, "failure", started.elapsed().as_secs_f64());
                return Err(e);
            }
        };

        if snapshot.is_empty() {
            // No metrics configured for this window; nothing to write.
            obs::record_pass(&window.name, "empty", started.elapsed().as_secs_f64());
            return Ok(());
        }

        self.write_snapshot(&window.name, &snapshot).await?;
        obs::record_pass(&window.name, "success", started.elapsed().as_secs_f64());
        info!(window = %window.name, metrics = snapshot.len(), "Synced history");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CombinePolicy;
    use crate::history::fetch::{QueryStatus, RawQueryResult, RawSeries};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::time::Duration;

    /// Stub backend answering from a fixed expression → result table.
    struct StubBackend {
        responses: HashMap<String, RawQueryResult>,
    }

    #[async_trait]
    impl RangeQuery for StubBackend {
        async fn fetch(
            &self,
            expression: &str,
            _start: i64,
            _end: i64,
            _step: Duration,
        ) -> Result<RawQueryResult> {
            match self.responses.get(expression) {
                Some(result) => Ok(result.clone()),
                None => Err(VigilError::Decode { reason: format!("no stub for {}", expression) }),
            }
        }
    }

    fn success_result(points: &[(i64, &str)]) -> RawQueryResult {
        RawQueryResult {
            status: QueryStatus::Success,
            status_text: "success".to_string(),
            result_kind: "matrix".to_string(),
            series: vec![RawSeries {
                labels: Default::default(),
                points: points.iter().map(|(t, v)| (*t, v.to_string())).collect(),
            }],
            warnings: Vec::new(),
            error_detail: None,
        }
    }

    fn error_result() -> RawQueryResult {
        RawQueryResult {
            status: QueryStatus::Error,
            status_text: "error".to_string(),
            result_kind: String::new(),
            series: Vec::new(),
            warnings: Vec::new(),
            error_detail: Some("bad_data: broken".to_string()),
        }
    }

    fn metric(key: &str, expression: &str) -> MetricQuery {
        MetricQuery {
            source_key: key.to_string(),
            expression: expression.to_string(),
            combine: CombinePolicy::Overwrite,
        }
    }

    fn window() -> WindowConfig {
        WindowConfig {
            name: "day".to_string(),
            lookback_secs: 24 * 3600,
            step_secs: 1800,
            min_expected_samples: 2,
        }
    }

    #[tokio::test]
    async fn test_build_snapshot_collects_all_metrics() {
        let mut responses = HashMap::new();
        responses.insert("up_a".to_string(), success_result(&[(1000, "1"), (2000, "2")]));
        responses.insert("up_b".to_string(), success_result(&[(1000, "5"), (2000, "6")]));
        let builder = HistorySnapshotBuilder::new(
            Arc::new(StubBackend { responses }),
            tempfile::tempdir().unwrap().path(),
        );

        let snapshot = builder
            .build_snapshot(&window(), &[metric("a", "up_a"), metric("b", "up_b")])
            .await
            .unwrap();

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot["a"][&2000], 2.0);
        assert_eq!(snapshot["b"][&1000], 5.0);
    }

    #[tokio::test]
    async fn test_one_failed_metric_aborts_the_pass() {
        let mut responses = HashMap::new();
        responses.insert("up_a".to_string(), success_result(&[(1000, "1")]));
        responses.insert("up_b".to_string(), error_result());
        let builder = HistorySnapshotBuilder::new(
            Arc::new(StubBackend { responses }),
            tempfile::tempdir().unwrap().path(),
        );

        let err = builder
            .build_snapshot(&window(), &[metric("a", "up_a"), metric("b", "up_b")])
            .await
            .unwrap_err();

        assert!(matches!(err, VigilError::PartialFailure { failed_key } if failed_key == "b"));
    }

    #[tokio::test]
    async fn test_write_snapshot_serializes_timestamp_keys_as_strings() {
        let dir = tempfile::tempdir().unwrap();
        let builder = HistorySnapshotBuilder::new(
            Arc::new(StubBackend { responses: HashMap::new() }),
            dir.path(),
        );

        let mut series = ReconciledSeries::new();
        series.insert(1685888801, 0.5);
        let mut snapshot = Snapshot::new();
        snapshot.insert("key".to_string(), series);

        let path = builder.write_snapshot("day", &snapshot).await.unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "{\"key\":{\"1685888801\":0.5}}");
    }
}
