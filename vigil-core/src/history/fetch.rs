//! Windowed range queries against the metrics backend.
//!
//! The backend speaks the Prometheus HTTP API: a form-encoded POST to
//! `/api/v1/query_range` answered with a JSON "matrix" of series, where
//! every sample value arrives as a string.

use crate::error::{Result, VigilError};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Outcome the backend reported for one range query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    Success,
    Error,
}

/// One series of a matrix response: its label set plus ordered
/// (timestamp, raw value) pairs.
#[derive(Debug, Clone, Default)]
pub struct RawSeries {
    pub labels: HashMap<String, String>,
    pub points: Vec<(i64, String)>,
}

/// A parsed range query response. Transient, never persisted.
#[derive(Debug, Clone)]
pub struct RawQueryResult {
    pub status: QueryStatus,
    /// The backend's literal status string, kept for diagnostics.
    pub status_text: String,
    pub result_kind: String,
    pub series: Vec<RawSeries>,
    pub warnings: Vec<String>,
    pub error_detail: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    status: String,
    #[serde(default)]
    data: Option<WireData>,
    #[serde(default, rename = "errorType")]
    error_type: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    warnings: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct WireData {
    #[serde(rename = "resultType")]
    result_type: String,
    #[serde(default)]
    result: Vec<WireSeries>,
}

#[derive(Debug, Deserialize)]
struct WireSeries {
    #[serde(default)]
    metric: HashMap<String, String>,
    #[serde(default)]
    values: Vec<(f64, String)>,
}

impl From<WireResponse> for RawQueryResult {
    fn from(wire: WireResponse) -> Self {
        let status = if wire.status == "success" { QueryStatus::Success } else { QueryStatus::Error };
        let error_detail = match (wire.error_type, wire.error) {
            (Some(kind), Some(message)) => Some(format!("{}: {}", kind, message)),
            (Some(kind), None) => Some(kind),
            (None, Some(message)) => Some(message),
            (None, None) => None,
        };
        let (result_kind, series) = match wire.data {
            Some(data) => (
                data.result_type,
                data.result
                    .into_iter()
                    .map(|s| RawSeries {
                        labels: s.metric,
                        points: s.values.into_iter().map(|(t, v)| (t as i64, v)).collect(),
                    })
                    .collect(),
            ),
            None => (String::new(), Vec::new()),
        };
        Self { status, status_text: wire.status, result_kind, series, warnings: wire.warnings, error_detail }
    }
}

/// Issues one windowed range query.
///
/// Implementations must not retry; the scheduler's fixed tick is the retry
/// cadence.
#[async_trait]
pub trait RangeQuery: Send + Sync {
    async fn fetch(
        &self,
        expression: &str,
        start: i64,
        end: i64,
        step: Duration,
    ) -> Result<RawQueryResult>;
}

/// HTTP client for the metrics backend.
#[derive(Debug, Clone)]
pub struct RangeClient {
    client: reqwest::Client,
    base_url: String,
}

impl RangeClient {
    /// Create a client for the given backend base URL.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| VigilError::InvalidConfig {
                reason: format!("Failed to create HTTP client: {}", e),
            })?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }
}

#[async_trait]
impl RangeQuery for RangeClient {
    async fn fetch(
        &self,
        expression: &str,
        start: i64,
        end: i64,
        step: Duration,
    ) -> Result<RawQueryResult> {
        let url = format!("{}/api/v1/query_range", self.base_url);
        let query = format!("({})", expression);
        let start_s = start.to_string();
        let end_s = end.to_string();
        let step_s = format!("{}s", step.as_secs());
        let params = [
            ("query", query.as_str()),
            ("start", start_s.as_str()),
            ("end", end_s.as_str()),
            ("step", step_s.as_str()),
        ];

        debug!(%url, start, end, step = %step_s, "Issuing range query");

        let response = self
            .client
            .post(&url)
            .form(&params)
            .send()
            .await
            .map_err(|e| VigilError::Transport { source: e })?;
        let body = response.bytes().await.map_err(|e| VigilError::Transport { source: e })?;

        let wire: WireResponse = serde_json::from_slice(&body)
            .map_err(|e| VigilError::Decode { reason: e.to_string() })?;
        Ok(wire.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The dense zero-filled vector plus a sparse series with real samples,
    // the shape the "OR vector(0)" query idiom produces.
    const MATRIX_RESPONSE: &str = r#"{
        "status": "success",
        "data": {
            "resultType": "matrix",
            "result": [
                {"metric": {}, "values": [[1685888801, "0"], [1685890601, "0"], [1685892401, "0"]]},
                {"metric": {"__name__": "forecast_service_subscription_count_total", "job": "forecast-service"},
                 "values": [[1685890601, "2"]]}
            ]
        }
    }"#;

    #[test]
    fn test_decode_matrix_response() {
        let wire: WireResponse = serde_json::from_str(MATRIX_RESPONSE).unwrap();
        let result = RawQueryResult::from(wire);

        assert_eq!(result.status, QueryStatus::Success);
        assert_eq!(result.result_kind, "matrix");
        assert_eq!(result.series.len(), 2);
        assert_eq!(result.series[0].points.len(), 3);
        assert_eq!(result.series[0].points[0], (1685888801, "0".to_string()));
        assert_eq!(result.series[1].points, vec![(1685890601, "2".to_string())]);
        assert_eq!(
            result.series[1].labels.get("job").map(String::as_str),
            Some("forecast-service")
        );
        assert!(result.warnings.is_empty());
        assert!(result.error_detail.is_none());
    }

    #[test]
    fn test_decode_error_response() {
        let body = r#"{"status": "error", "errorType": "bad_data", "error": "parse error"}"#;
        let wire: WireResponse = serde_json::from_str(body).unwrap();
        let result = RawQueryResult::from(wire);

        assert_eq!(result.status, QueryStatus::Error);
        assert_eq!(result.status_text, "error");
        assert_eq!(result.error_detail.as_deref(), Some("bad_data: parse error"));
        assert!(result.series.is_empty());
    }

    #[test]
    fn test_unknown_status_is_treated_as_error() {
        let body = r#"{"status": "partial"}"#;
        let wire: WireResponse = serde_json::from_str(body).unwrap();
        let result = RawQueryResult::from(wire);

        assert_eq!(result.status, QueryStatus::Error);
        assert_eq!(result.status_text, "partial");
    }

    #[test]
    fn test_warnings_survive_decoding() {
        let body = r#"{
            "status": "success",
            "warnings": ["query covered a partial interval"],
            "data": {"resultType": "matrix", "result": []}
        }"#;
        let wire: WireResponse = serde_json::from_str(body).unwrap();
        let result = RawQueryResult::from(wire);

        assert_eq!(result.status, QueryStatus::Success);
        assert_eq!(result.warnings, vec!["query covered a partial interval".to_string()]);
    }

    #[test]
    fn test_fractional_timestamps_truncate_to_seconds() {
        let body = r#"{
            "status": "success",
            "data": {"resultType": "matrix",
                     "result": [{"metric": {}, "values": [[1685888801.5, "1.25"]]}]}
        }"#;
        let wire: WireResponse = serde_json::from_str(body).unwrap();
        let result = RawQueryResult::from(wire);

        assert_eq!(result.series[0].points, vec![(1685888801, "1.25".to_string())]);
    }
}
