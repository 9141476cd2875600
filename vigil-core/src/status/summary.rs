//! Aggregate status summary.

use crate::inventory::Station;
use crate::observations::Observation;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Quality at or below which an observation counts as bad.
pub const BAD_QUALITY_THRESHOLD: f64 = 0.5;

/// Aggregate health of the forecast service, written to `status.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSummary {
    pub status_update_time: i64,
    pub num_stations: usize,
    pub num_observations: usize,
    pub num_bad_observations: usize,
    pub most_recent_observation_time: Option<i64>,
    pub oldest_observation_time: Option<i64>,
    pub average_quality: Option<f64>,
}

/// Aggregate the stores into one summary.
///
/// Qualities outside `[0, 1]` are excluded from the average's sum but the
/// denominator stays the full observation count.
pub fn summarize(
    stations: &HashMap<String, Station>,
    observations: &HashMap<String, Observation>,
    timestamps: &HashMap<String, i64>,
    now: i64,
) -> StatusSummary {
    let most_recent_observation_time = timestamps.values().copied().max();
    let oldest_observation_time = timestamps.values().copied().min();

    let mut num_bad_observations = 0;
    let average_quality = if observations.is_empty() {
        None
    } else {
        let mut sum = 0.0;
        for observation in observations.values() {
            if observation.quality <= BAD_QUALITY_THRESHOLD {
                num_bad_observations += 1;
            }
            if !(0.0..=1.0).contains(&observation.quality) {
                continue;
            }
            sum += observation.quality;
        }
        Some(sum / observations.len() as f64)
    };

    StatusSummary {
        status_update_time: now,
        num_stations: stations.len(),
        num_observations: observations.len(),
        num_bad_observations,
        most_recent_observation_time,
        oldest_observation_time,
        average_quality,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observation(quality: f64) -> Observation {
        Observation {
            phase_threshold: 0,
            quality,
            signal_group_id: "sg".to_string(),
            start_time: String::new(),
            value: vec![],
            timestamp: String::new(),
        }
    }

    #[test]
    fn test_empty_stores_yield_null_fields() {
        let summary = summarize(&HashMap::new(), &HashMap::new(), &HashMap::new(), 1000);

        assert_eq!(summary.num_stations, 0);
        assert_eq!(summary.num_observations, 0);
        assert!(summary.most_recent_observation_time.is_none());
        assert!(summary.oldest_observation_time.is_none());
        assert!(summary.average_quality.is_none());

        let json: serde_json::Value =
            serde_json::from_slice(&serde_json::to_vec(&summary).unwrap()).unwrap();
        assert!(json["average_quality"].is_null());
    }

    #[test]
    fn test_bad_observations_are_counted() {
        let mut observations = HashMap::new();
        observations.insert("a".to_string(), observation(0.3));
        observations.insert("b".to_string(), observation(0.5));
        observations.insert("c".to_string(), observation(0.9));

        let summary = summarize(&HashMap::new(), &observations, &HashMap::new(), 1000);

        // 0.5 is inclusive
        assert_eq!(summary.num_bad_observations, 2);
        let average = summary.average_quality.unwrap();
        assert!((average - (0.3 + 0.5 + 0.9) / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_out_of_range_quality_excluded_from_sum() {
        let mut observations = HashMap::new();
        observations.insert("a".to_string(), observation(-1.0));
        observations.insert("b".to_string(), observation(1.0));

        let summary = summarize(&HashMap::new(), &observations, &HashMap::new(), 1000);

        // Sum only counts the in-range value; denominator stays 2.
        assert_eq!(summary.average_quality, Some(0.5));
        assert_eq!(summary.num_bad_observations, 1);
    }

    #[test]
    fn test_min_max_observation_times() {
        let mut timestamps = HashMap::new();
        timestamps.insert("a".to_string(), 100);
        timestamps.insert("b".to_string(), 300);
        timestamps.insert("c".to_string(), 200);

        let summary = summarize(&HashMap::new(), &HashMap::new(), &timestamps, 1000);

        assert_eq!(summary.most_recent_observation_time, Some(300));
        assert_eq!(summary.oldest_observation_time, Some(100));
    }
}
