//! Station inventory.
//!
//! Stations are the monitored entities: each publishes observations on its
//! own broker topic and carries the geometry used by the map artifacts.

pub mod store;
pub mod sync;

pub use store::StationStore;
pub use sync::InventorySync;

use crate::error::{Result, VigilError};
use serde::{Deserialize, Serialize};

/// A monitored station as returned by the inventory API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Station {
    #[serde(default)]
    pub description: String,
    pub name: String,
    #[serde(default)]
    pub properties: StationProperties,
    #[serde(default, rename = "Locations")]
    pub locations: Vec<StationLocation>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationProperties {
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub asset_id: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub path_kind: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub connection_id: String,
    #[serde(default)]
    pub info_last_updated: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StationLocation {
    #[serde(default)]
    pub location: LocationShape,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocationShape {
    #[serde(default)]
    pub geometry: LocationGeometry,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocationGeometry {
    /// Path segments, each a list of `[lng, lat]` coordinates.
    #[serde(default)]
    pub coordinates: Vec<Vec<Vec<f64>>>,
}

impl Station {
    /// Broker topic this station's observations are published on.
    pub fn topic(&self, prefix: &str) -> String {
        format!("{}/{}", prefix, self.name)
    }

    /// The station's path: the connection segment of its geometry.
    pub fn path(&self) -> Result<&Vec<Vec<f64>>> {
        let location = self.locations.first().ok_or_else(|| VigilError::InvalidStation {
            name: self.name.clone(),
            reason: "station has no locations".to_string(),
        })?;
        let segments = &location.location.geometry.coordinates;
        if segments.len() < 2 {
            return Err(VigilError::InvalidStation {
                name: self.name.clone(),
                reason: "station has no connection segment".to_string(),
            });
        }
        // 0: ingress segment, 1: connection segment, 2: egress segment
        let connection = &segments[1];
        if connection.is_empty() {
            return Err(VigilError::InvalidStation {
                name: self.name.clone(),
                reason: "connection segment has no coordinates".to_string(),
            });
        }
        Ok(connection)
    }

    /// The station's position as `(lat, lng)`: the first coordinate of its
    /// path.
    pub fn position(&self) -> Result<(f64, f64)> {
        let path = self.path()?;
        let coordinate = &path[0];
        if coordinate.len() < 2 {
            return Err(VigilError::InvalidStation {
                name: self.name.clone(),
                reason: "coordinate has fewer than two components".to_string(),
            });
        }
        Ok((coordinate[1], coordinate[0]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn station_with_geometry(name: &str, segments: Vec<Vec<Vec<f64>>>) -> Station {
        Station {
            description: String::new(),
            name: name.to_string(),
            properties: StationProperties::default(),
            locations: vec![StationLocation {
                location: LocationShape { geometry: LocationGeometry { coordinates: segments } },
            }],
        }
    }

    #[test]
    fn test_path_returns_connection_segment() {
        let station = station_with_geometry(
            "crossing-1",
            vec![
                vec![vec![9.9, 53.5]],
                vec![vec![10.0, 53.55], vec![10.01, 53.56]],
                vec![vec![10.1, 53.6]],
            ],
        );

        let path = station.path().unwrap();
        assert_eq!(path.len(), 2);
        assert_eq!(path[0], vec![10.0, 53.55]);
    }

    #[test]
    fn test_position_swaps_lng_lat() {
        let station = station_with_geometry(
            "crossing-1",
            vec![vec![vec![9.9, 53.5]], vec![vec![10.0, 53.55]]],
        );

        let (lat, lng) = station.position().unwrap();
        assert_eq!(lat, 53.55);
        assert_eq!(lng, 10.0);
    }

    #[test]
    fn test_station_without_locations_is_invalid() {
        let mut station = station_with_geometry("crossing-1", vec![]);
        station.locations.clear();
        assert!(station.position().is_err());
    }

    #[test]
    fn test_station_without_connection_segment_is_invalid() {
        let station = station_with_geometry("crossing-1", vec![vec![vec![9.9, 53.5]]]);
        assert!(station.path().is_err());
    }

    #[test]
    fn test_topic_prefixes_name() {
        let station = station_with_geometry("crossing-1", vec![]);
        assert_eq!(station.topic("stations"), "stations/crossing-1");
    }

    #[test]
    fn test_decode_inventory_payload() {
        let payload = r#"{
            "name": "crossing-7",
            "description": "east approach",
            "properties": {"topic": "crossing-7", "pathKind": "cycle"},
            "Locations": [{"location": {"geometry": {
                "coordinates": [[[9.9, 53.5]], [[10.0, 53.55]]]
            }}}]
        }"#;
        let station: Station = serde_json::from_str(payload).unwrap();
        assert_eq!(station.name, "crossing-7");
        assert_eq!(station.properties.path_kind, "cycle");
        assert!(station.position().is_ok());
    }
}
