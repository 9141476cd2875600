//! Live forecast ingestion.
//!
//! The forecast service publishes one message per station topic; vigil
//! keeps only the newest message per topic in a guarded in-memory table.

pub mod listener;
pub mod store;

pub use listener::ObservationListener;
pub use store::ObservationStore;

use crate::error::{Result, VigilError};
use serde::{Deserialize, Serialize};

/// A single forecast message as published by the forecast service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    /// Threshold in seconds above which the forecast counts as a full phase.
    #[serde(default)]
    pub phase_threshold: i64,
    /// Forecast quality in `[0, 1]`.
    pub quality: f64,
    pub signal_group_id: String,
    /// RFC 3339 start time; may carry a `[UTC]` suffix and may omit seconds.
    pub start_time: String,
    #[serde(default)]
    pub value: Vec<i64>,
    #[serde(default)]
    pub timestamp: String,
}

impl Observation {
    /// Parse `start_time` into unix seconds.
    ///
    /// The service occasionally drops the seconds component; a missing
    /// seconds field is re-inserted before giving up.
    pub fn start_time_unix(&self) -> Result<i64> {
        let cleaned = self.start_time.replace("[UTC]", "");
        if let Ok(parsed) = chrono::DateTime::parse_from_rfc3339(&cleaned) {
            return Ok(parsed.timestamp());
        }

        let parts: Vec<&str> = cleaned.split('Z').collect();
        if parts.len() != 2 {
            return Err(VigilError::InvalidTimestamp {
                value: self.start_time.clone(),
                reason: "not an RFC 3339 timestamp".to_string(),
            });
        }
        let padded = format!("{}:00Z{}", parts[0], parts[1]);
        chrono::DateTime::parse_from_rfc3339(&padded)
            .map(|parsed| parsed.timestamp())
            .map_err(|e| VigilError::InvalidTimestamp {
                value: self.start_time.clone(),
                reason: e.to_string(),
            })
    }
}
