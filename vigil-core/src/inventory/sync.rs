//! Paginated inventory fetch.
//!
//! The inventory API pages its results; every page carries a
//! `@iot.nextLink` pointing at the next one until the set is exhausted.

use super::store::StationStore;
use super::Station;
use crate::error::{Result, VigilError};
use crate::observability::metrics as obs;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, instrument, warn};

#[derive(Debug, Deserialize)]
struct StationsPage {
    #[serde(default)]
    value: Vec<Station>,
    #[serde(rename = "@iot.nextLink")]
    next_link: Option<String>,
}

/// Periodically refreshes the station store from the inventory API.
pub struct InventorySync {
    client: reqwest::Client,
    base_url: String,
    filter: String,
    topic_prefix: String,
    store: Arc<StationStore>,
    interval: Duration,
}

impl InventorySync {
    /// Create a sync task against the given inventory base URL.
    pub fn new(
        base_url: impl Into<String>,
        filter: impl Into<String>,
        topic_prefix: impl Into<String>,
        store: Arc<StationStore>,
        interval: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| VigilError::InvalidConfig {
                reason: format!("Failed to create HTTP client: {}", e),
            })?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            filter: filter.into(),
            topic_prefix: topic_prefix.into(),
            store,
            interval,
        })
    }

    /// Fetch every page of the station query and upsert the results.
    ///
    /// Stations without a usable position are skipped; the map artifacts
    /// could not place them anyway.
    #[instrument(skip(self))]
    pub async fn sync_once(&self) -> Result<usize> {
        let first_page = reqwest::Url::parse_with_params(
            &format!("{}Things", self.base_url),
            &[("$filter", self.filter.as_str())],
        )
        .map_err(|e| VigilError::InvalidConfig { reason: format!("Invalid inventory url: {}", e) })?;

        let mut page_url = first_page.to_string();
        let mut found = 0usize;
        loop {
            let response = self
                .client
                .get(&page_url)
                .send()
                .await
                .map_err(|e| VigilError::Transport { source: e })?;
            if !response.status().is_success() {
                return Err(VigilError::UpstreamStatus {
                    status: response.status().as_u16(),
                    url: page_url,
                });
            }
            let page: StationsPage = response
                .json()
                .await
                .map_err(|e| VigilError::Decode { reason: e.to_string() })?;

            for station in page.value {
                match station.position() {
                    Ok(_) => {
                        let topic = station.topic(&self.topic_prefix);
                        self.store.upsert(topic, station).await;
                        found += 1;
                    }
                    Err(e) => {
                        warn!(station = %station.name, error = %e, "Skipping station without a usable position");
                    }
                }
            }

            match page.next_link {
                Some(next) => page_url = next,
                None => break,
            }
        }

        obs::set_station_count(self.store.len().await);
        Ok(found)
    }

    /// Run the sync loop until shutdown.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        loop {
            info!("Syncing station inventory");
            match self.sync_once().await {
                Ok(found) => {
                    info!(found, total = self.store.len().await, "Finished inventory sync");
                }
                Err(e) => warn!(error = %e, "Inventory sync failed"),
            }
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Inventory sync stopping");
                    break;
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_decoding_with_next_link() {
        let body = r#"{
            "value": [{"name": "crossing-1"}],
            "@iot.nextLink": "http://inventory/v1.1/Things?$skip=100"
        }"#;
        let page: StationsPage = serde_json::from_str(body).unwrap();
        assert_eq!(page.value.len(), 1);
        assert_eq!(page.next_link.as_deref(), Some("http://inventory/v1.1/Things?$skip=100"));
    }

    #[test]
    fn test_last_page_has_no_next_link() {
        let body = r#"{"value": []}"#;
        let page: StationsPage = serde_json::from_str(body).unwrap();
        assert!(page.value.is_empty());
        assert!(page.next_link.is_none());
    }
}
