//! Per-station status files and their index.

use crate::inventory::Station;
use crate::observations::Observation;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Point-in-time status of one station, written to `<name>-status.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationStatus {
    pub status_update_time: i64,
    pub station_name: String,
    pub quality: Option<f64>,
    pub most_recent_observation_time: Option<i64>,
}

/// Build the per-station statuses plus the index workers use to discover
/// them. Both are sorted by station name for stable output.
pub fn station_statuses(
    stations: &HashMap<String, Station>,
    observations: &HashMap<String, Observation>,
    timestamps: &HashMap<String, i64>,
    now: i64,
) -> (Vec<(String, StationStatus)>, Vec<String>) {
    let mut statuses = Vec::with_capacity(stations.len());
    let mut index = Vec::with_capacity(stations.len());

    for (topic, station) in stations {
        let status = StationStatus {
            status_update_time: now,
            station_name: station.name.clone(),
            quality: observations.get(topic).map(|o| o.quality),
            most_recent_observation_time: timestamps.get(topic).copied(),
        };
        index.push(station.name.clone());
        statuses.push((format!("{}-status.json", station.name), status));
    }

    statuses.sort_by(|a, b| a.0.cmp(&b.0));
    index.sort();
    (statuses, index)
}
