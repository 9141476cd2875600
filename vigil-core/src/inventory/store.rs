//! Guarded station table.

use super::Station;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Synchronized map from broker topic to station.
#[derive(Default)]
pub struct StationStore {
    stations: RwLock<HashMap<String, Station>>,
}

impl StationStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the station behind a topic.
    pub async fn upsert(&self, topic: String, station: Station) {
        self.stations.write().await.insert(topic, station);
    }

    /// Snapshot of all known stations.
    pub async fn snapshot(&self) -> HashMap<String, Station> {
        self.stations.read().await.clone()
    }

    /// Number of known stations.
    pub async fn len(&self) -> usize {
        self.stations.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.stations.read().await.is_empty()
    }
}
