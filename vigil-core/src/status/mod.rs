//! Consumer-facing status artifacts.
//!
//! A periodic monitor pass aggregates the observation and station stores
//! into the summary, the per-station statuses, the GeoJSON map pair and
//! the exposition dump. One artifact failing is logged and does not stop
//! the others.

pub mod map;
pub mod station;
pub mod summary;

pub use station::StationStatus;
pub use summary::StatusSummary;

use crate::clock::unix_now;
use crate::error::Result;
use crate::fsutil;
use crate::inventory::StationStore;
use crate::observability::metrics as obs;
use crate::observations::ObservationStore;
use crate::replication::WorkerPusher;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Writes all status artifacts on a fixed cadence.
pub struct StatusWriter {
    static_dir: PathBuf,
    stations: Arc<StationStore>,
    observations: Arc<ObservationStore>,
    /// When set, every written artifact is also pushed to the workers.
    pusher: Option<Arc<WorkerPusher>>,
}

impl StatusWriter {
    /// Create a writer emitting into `static_dir`.
    pub fn new(
        static_dir: impl Into<PathBuf>,
        stations: Arc<StationStore>,
        observations: Arc<ObservationStore>,
        pusher: Option<Arc<WorkerPusher>>,
    ) -> Self {
        Self { static_dir: static_dir.into(), stations, observations, pusher }
    }

    /// Write one artifact and replicate it when a pusher is configured.
    async fn emit(&self, artifact: &str, rel_path: &str, bytes: &[u8]) -> Result<()> {
        fsutil::write_atomic(&self.static_dir.join(rel_path), bytes).await?;
        obs::record_status_write(artifact);
        if let Some(pusher) = &self.pusher {
            pusher.push_file(bytes, rel_path).await;
        }
        Ok(())
    }

    /// Run every writer once against a consistent snapshot of the stores.
    pub async fn write_all(&self) {
        let now = unix_now();
        let stations = self.stations.snapshot().await;
        let observations = self.observations.snapshot().await;
        let timestamps = self.observations.timestamps().await;

        // Summary
        let summary = summary::summarize(&stations, &observations, &timestamps, now);
        match serde_json::to_vec(&summary) {
            Ok(bytes) => {
                if let Err(e) = self.emit("summary", "status.json", &bytes).await {
                    warn!(error = %e, "Could not write status summary");
                }
            }
            Err(e) => warn!(error = %e, "Could not serialize status summary"),
        }

        // Per-station statuses plus their index
        let (statuses, index) =
            station::station_statuses(&stations, &observations, &timestamps, now);
        for (filename, status) in &statuses {
            match serde_json::to_vec(status) {
                Ok(bytes) => {
                    if let Err(e) = self.emit("station-status", filename, &bytes).await {
                        warn!(station = %status.station_name, error = %e, "Could not write station status");
                    }
                }
                Err(e) => warn!(station = %status.station_name, error = %e, "Could not serialize station status"),
            }
        }
        match serde_json::to_vec(&index) {
            Ok(bytes) => {
                if let Err(e) = self.emit("station-index", "station-index.json", &bytes).await {
                    warn!(error = %e, "Could not write station index");
                }
            }
            Err(e) => warn!(error = %e, "Could not serialize station index"),
        }

        // Map artifacts
        let (locations, paths, exposition) =
            map::build_map(&stations, &observations, &timestamps, now);
        match serde_json::to_vec(&locations) {
            Ok(bytes) => {
                if let Err(e) =
                    self.emit("map-locations", "stations-locations.geojson", &bytes).await
                {
                    warn!(error = %e, "Could not write locations geojson");
                }
            }
            Err(e) => warn!(error = %e, "Could not serialize locations geojson"),
        }
        match serde_json::to_vec(&paths) {
            Ok(bytes) => {
                if let Err(e) = self.emit("map-paths", "stations-paths.geojson", &bytes).await {
                    warn!(error = %e, "Could not write paths geojson");
                }
            }
            Err(e) => warn!(error = %e, "Could not serialize paths geojson"),
        }
        if let Err(e) = self.emit("exposition", "metrics.txt", exposition.as_bytes()).await {
            warn!(error = %e, "Could not write exposition dump");
        }
    }

    /// Periodic monitor loop: initial grace delay so the stores can fill,
    /// then a fixed cadence until shutdown.
    pub async fn run(
        self,
        initial_delay: Duration,
        interval: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        info!("Status monitor starting");
        tokio::select! {
            _ = shutdown.recv() => return,
            _ = tokio::time::sleep(initial_delay) => {}
        }
        loop {
            info!("Writing status artifacts");
            self.write_all().await;
            info!("Done writing status artifacts");
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Status monitor stopping");
                    break;
                }
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }
}
