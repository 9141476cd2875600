//! Latest-value table for incoming observations.
//!
//! Callers get a narrow guarded interface: upsert one topic, or take a
//! snapshot of everything. The maps are never exposed for direct mutation.

use super::Observation;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    latest: HashMap<String, Observation>,
    timestamps: HashMap<String, i64>,
    received: u64,
}

/// Guarded latest-observation table keyed by broker topic.
#[derive(Default)]
pub struct ObservationStore {
    tables: RwLock<Tables>,
}

impl ObservationStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the newest observation for a topic. The parsed start time is
    /// only stored when the caller could derive one.
    pub async fn upsert(&self, topic: &str, observation: Observation, start_time_unix: Option<i64>) {
        let mut tables = self.tables.write().await;
        tables.latest.insert(topic.to_string(), observation);
        if let Some(timestamp) = start_time_unix {
            tables.timestamps.insert(topic.to_string(), timestamp);
        }
        tables.received += 1;
    }

    /// Latest observation for a topic, if any.
    pub async fn latest(&self, topic: &str) -> Option<Observation> {
        self.tables.read().await.latest.get(topic).cloned()
    }

    /// Snapshot of every topic's latest observation.
    pub async fn snapshot(&self) -> HashMap<String, Observation> {
        self.tables.read().await.latest.clone()
    }

    /// Snapshot of every topic's latest observation start time.
    pub async fn timestamps(&self) -> HashMap<String, i64> {
        self.tables.read().await.timestamps.clone()
    }

    /// Number of topics with at least one observation.
    pub async fn len(&self) -> usize {
        self.tables.read().await.latest.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tables.read().await.latest.is_empty()
    }

    /// Total messages received since startup.
    pub async fn received_total(&self) -> u64 {
        self.tables.read().await.received
    }
}
