//! Worker-side pull replication.
//!
//! A worker mirrors the manager's static directory: the fixed artifact set
//! first, then every per-station status named by `station-index.json`.

use crate::error::{Result, VigilError};
use crate::fsutil;
use crate::observability::metrics as obs;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Artifacts every worker mirrors unconditionally.
const FIXED_ARTIFACTS: &[&str] =
    &["stations-locations.geojson", "stations-paths.geojson", "status.json"];

/// Pulls the manager's files into the local static directory.
pub struct PullWorker {
    client: reqwest::Client,
    manager_url: String,
    static_dir: PathBuf,
}

impl PullWorker {
    /// Create a pull worker mirroring from `manager_url`.
    pub fn new(manager_url: impl Into<String>, static_dir: impl Into<PathBuf>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| VigilError::InvalidConfig {
                reason: format!("Failed to create HTTP client: {}", e),
            })?;
        let manager_url = manager_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, manager_url, static_dir: static_dir.into() })
    }

    /// Fetch one file and write it atomically into the static directory.
    async fn fetch_file(&self, rel_path: &str) -> Result<()> {
        let url = format!("{}/{}", self.manager_url, rel_path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| VigilError::Transport { source: e })?;
        if !response.status().is_success() {
            return Err(VigilError::UpstreamStatus {
                status: response.status().as_u16(),
                url,
            });
        }
        let bytes = response.bytes().await.map_err(|e| VigilError::Transport { source: e })?;

        fsutil::write_atomic(&self.static_dir.join(rel_path), &bytes).await?;
        obs::record_pull();
        debug!(rel_path, "Fetched file");
        Ok(())
    }

    /// Fetch the station index and every status file it names.
    async fn fetch_station_statuses(&self) -> Result<usize> {
        let url = format!("{}/station-index.json", self.manager_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| VigilError::Transport { source: e })?;
        if !response.status().is_success() {
            return Err(VigilError::UpstreamStatus {
                status: response.status().as_u16(),
                url,
            });
        }
        let index: Vec<String> = response
            .json()
            .await
            .map_err(|e| VigilError::Decode { reason: e.to_string() })?;

        let bytes = serde_json::to_vec(&index)
            .map_err(|e| VigilError::Serialize { reason: e.to_string() })?;
        fsutil::write_atomic(&self.static_dir.join("station-index.json"), &bytes).await?;

        for name in &index {
            self.fetch_file(&format!("{}-status.json", name)).await?;
        }
        Ok(index.len())
    }

    /// Run the mirror loop until shutdown.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        loop {
            info!("Starting file sync from manager");
            let result: Result<()> = async {
                for artifact in FIXED_ARTIFACTS {
                    self.fetch_file(artifact).await?;
                }
                let stations = self.fetch_station_statuses().await?;
                info!(stations, "File sync done");
                Ok(())
            }
            .await;
            if let Err(e) = result {
                warn!(error = %e, "File sync failed");
            }

            // 40-90s of jitter keeps a worker fleet from hammering the
            // manager at the same instant.
            let wait = Duration::from_secs(40 + rand::random::<u64>() % 50);
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Pull worker stopping");
                    break;
                }
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }
}
