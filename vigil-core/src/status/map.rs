//! GeoJSON map artifacts and the exposition dump.
//!
//! Two feature collections are produced per pass: one point per station for
//! the locations layer and one line per station for the paths layer. The
//! same properties also go out as Prometheus exposition lines so the map
//! can be rendered in Grafana.

use crate::inventory::Station;
use crate::observations::Observation;
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value};
use serde_json::json;
use std::collections::HashMap;
use std::fmt::Write as _;
use tracing::warn;

/// Properties attached to every station feature.
fn feature_properties(
    station: &Station,
    observation: Option<&Observation>,
    timestamp: Option<i64>,
    now: i64,
) -> JsonObject {
    let mut properties = JsonObject::new();
    match (observation, timestamp) {
        (Some(observation), Some(timestamp)) => {
            properties.insert("observation_available".to_string(), json!(true));
            properties.insert("quality".to_string(), json!(observation.quality));
            properties.insert("observation_age".to_string(), json!(now - timestamp));
            properties
                .insert("signal_group_id".to_string(), json!(observation.signal_group_id));
        }
        _ => {
            properties.insert("observation_available".to_string(), json!(false));
            properties.insert("quality".to_string(), json!(-1.0));
            properties.insert("observation_age".to_string(), json!(0));
            properties.insert("signal_group_id".to_string(), json!(""));
        }
    }
    properties.insert("station_name".to_string(), json!(station.name));
    properties.insert("station_path_kind".to_string(), json!(station.properties.path_kind));
    properties
}

/// Build the locations and paths collections plus the exposition lines for
/// every station with usable geometry. Stations are processed in topic
/// order so the output is stable.
pub fn build_map(
    stations: &HashMap<String, Station>,
    observations: &HashMap<String, Observation>,
    timestamps: &HashMap<String, i64>,
    now: i64,
) -> (FeatureCollection, FeatureCollection, String) {
    let mut points = Vec::with_capacity(stations.len());
    let mut lines = Vec::with_capacity(stations.len());
    let mut exposition = String::new();

    let mut topics: Vec<&String> = stations.keys().collect();
    topics.sort();

    for topic in topics {
        let station = &stations[topic];
        let path = match station.path() {
            Ok(path) => path.clone(),
            Err(e) => {
                warn!(station = %station.name, error = %e, "Skipping station on the map");
                continue;
            }
        };
        let (lat, lng) = match station.position() {
            Ok(position) => position,
            Err(e) => {
                warn!(station = %station.name, error = %e, "Skipping station on the map");
                continue;
            }
        };

        let observation = observations.get(topic);
        let timestamp = timestamps.get(topic).copied();
        let properties = feature_properties(station, observation, timestamp, now);

        points.push(Feature {
            bbox: None,
            geometry: Some(Geometry::new(Value::Point(vec![lng, lat]))),
            id: None,
            properties: Some(properties.clone()),
            foreign_members: None,
        });
        lines.push(Feature {
            bbox: None,
            geometry: Some(Geometry::new(Value::LineString(path))),
            id: None,
            properties: Some(properties),
            foreign_members: None,
        });

        let quality = match (observation, timestamp) {
            (Some(observation), Some(_)) => observation.quality,
            _ => -1.0,
        };
        let age = timestamp.map(|t| now - t).unwrap_or(0);
        let (available, sg) = match observation {
            Some(observation) if timestamp.is_some() => {
                (true, observation.signal_group_id.as_str())
            }
            _ => (false, ""),
        };
        let _ = writeln!(
            exposition,
            "vigil_station_quality{{lat=\"{}\",lng=\"{}\",observation_available=\"{}\",\
             observation_age=\"{}\",signal_group_id=\"{}\",station_name=\"{}\",\
             station_path_kind=\"{}\"}} {}",
            lat, lng, available, age, sg, station.name, station.properties.path_kind, quality
        );
    }

    let locations =
        FeatureCollection { bbox: None, features: points, foreign_members: None };
    let paths = FeatureCollection { bbox: None, features: lines, foreign_members: None };
    (locations, paths, exposition)
}
