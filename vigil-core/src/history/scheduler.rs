//! Fixed-interval scheduling of history passes.
//!
//! Every window gets its own repeating task so a backend outage hitting one
//! window never stalls the other's cadence. There is no backoff between
//! ticks; the fixed interval is the retry cadence.

use crate::config::{MetricQuery, WindowConfig};
use crate::history::snapshot::HistorySnapshotBuilder;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Spawns one repeating sync task per configured window.
pub struct HistoryScheduler {
    builder: Arc<HistorySnapshotBuilder>,
    interval: Duration,
}

impl HistoryScheduler {
    /// Create a scheduler running each window every `interval`.
    pub fn new(builder: Arc<HistorySnapshotBuilder>, interval: Duration) -> Self {
        Self { builder, interval }
    }

    /// Spawn the window tasks. Each runs until the shutdown channel fires.
    pub fn spawn(
        &self,
        windows: Vec<WindowConfig>,
        metrics: Vec<MetricQuery>,
        shutdown: &broadcast::Sender<()>,
    ) -> Vec<JoinHandle<()>> {
        let metrics = Arc::new(metrics);
        windows
            .into_iter()
            .map(|window| {
                let builder = self.builder.clone();
                let metrics = metrics.clone();
                let interval = self.interval;
                let mut shutdown = shutdown.subscribe();
                tokio::spawn(async move {
                    info!(
                        window = %window.name,
                        interval_secs = interval.as_secs(),
                        "History window task started"
                    );
                    loop {
                        if let Err(e) = builder.sync_once(&window, &metrics).await {
                            warn!(
                                window = %window.name,
                                error = %e,
                                "History pass failed, keeping previous snapshot"
                            );
                        }
                        tokio::select! {
                            _ = shutdown.recv() => {
                                info!(window = %window.name, "History window task stopping");
                                break;
                            }
                            _ = tokio::time::sleep(interval) => {}
                        }
                    }
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CombinePolicy;
    use crate::error::Result;
    use crate::history::fetch::{QueryStatus, RangeQuery, RawQueryResult, RawSeries};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingBackend {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl RangeQuery for CountingBackend {
        async fn fetch(
            &self,
            _expression: &str,
            _start: i64,
            _end: i64,
            _step: Duration,
        ) -> Result<RawQueryResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(RawQueryResult {
                status: QueryStatus::Success,
                status_text: "success".to_string(),
                result_kind: "matrix".to_string(),
                series: vec![RawSeries {
                    labels: Default::default(),
                    points: vec![(1000, "1".to_string())],
                }],
                warnings: Vec::new(),
                error_detail: None,
            })
        }
    }

    #[tokio::test]
    async fn test_tasks_run_and_stop_on_shutdown() {
        let calls = Arc::new(AtomicUsize::new(0));
        let dir = tempfile::tempdir().unwrap();
        let builder = Arc::new(HistorySnapshotBuilder::new(
            Arc::new(CountingBackend { calls: calls.clone() }),
            dir.path(),
        ));
        let scheduler = HistoryScheduler::new(builder, Duration::from_secs(3600));
        let (shutdown, _) = broadcast::channel(1);

        let windows = vec![
            WindowConfig {
                name: "day".to_string(),
                lookback_secs: 24 * 3600,
                step_secs: 1800,
                min_expected_samples: 1,
            },
            WindowConfig {
                name: "week".to_string(),
                lookback_secs: 7 * 24 * 3600,
                step_secs: 7200,
                min_expected_samples: 1,
            },
        ];
        let metrics = vec![MetricQuery {
            source_key: "key".to_string(),
            expression: "up".to_string(),
            combine: CombinePolicy::Overwrite,
        }];

        let handles = scheduler.spawn(windows, metrics, &shutdown);
        assert_eq!(handles.len(), 2);

        // Let both windows run their first pass, then stop them.
        tokio::time::sleep(Duration::from_millis(200)).await;
        shutdown.send(()).unwrap();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(dir.path().join("day-history.json").exists());
        assert!(dir.path().join("week-history.json").exists());
    }
}
