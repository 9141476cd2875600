//! Series reconciliation.
//!
//! Turns the raw series of one range query into a single dense mapping from
//! timestamp to value. The backend's "OR vector(0)" idiom returns a dense
//! zero-filled series followed by a sparse series of real samples; series
//! later in the response take priority under the overwrite policy, so real
//! samples always win over the baseline.

use crate::config::{CombinePolicy, MetricQuery, WindowConfig};
use crate::error::{Result, VigilError};
use crate::history::fetch::{QueryStatus, RawQueryResult};
use crate::observability::metrics as obs;
use std::collections::BTreeMap;
use tracing::warn;

/// Dense mapping from epoch-second timestamp to value for one metric.
/// Keyed storage keeps timestamps unique; the tree order makes the
/// serialized snapshot deterministic.
pub type ReconciledSeries = BTreeMap<i64, f64>;

/// Result kind a range query is expected to produce.
const MATRIX_KIND: &str = "matrix";

/// Reconcile one metric's raw query result into a dense series.
///
/// A sample whose value does not parse as a float is dropped and the rest
/// of the metric is kept; one bad sample must never abort the whole metric.
/// A result sparser than the window expects is surfaced as a warning but
/// still returned.
pub fn reconcile(
    metric: &MetricQuery,
    result: &RawQueryResult,
    window: &WindowConfig,
) -> Result<ReconciledSeries> {
    if result.status != QueryStatus::Success {
        warn!(
            key = %metric.source_key,
            status = %result.status_text,
            detail = ?result.error_detail,
            "Backend rejected range query"
        );
        return Err(VigilError::BackendStatus {
            status: result.status_text.clone(),
            detail: result.error_detail.clone(),
        });
    }

    if result.result_kind != MATRIX_KIND {
        return Err(VigilError::UnexpectedShape { kind: result.result_kind.clone() });
    }

    for warning in &result.warnings {
        warn!(key = %metric.source_key, warning = %warning, "Backend returned a warning");
    }

    let mut series = ReconciledSeries::new();
    for raw in &result.series {
        for (timestamp, raw_value) in &raw.points {
            let value: f64 = match raw_value.parse() {
                Ok(v) => v,
                Err(_) => {
                    warn!(
                        key = %metric.source_key,
                        value = %raw_value,
                        "Dropping sample whose value does not parse"
                    );
                    obs::record_dropped_sample(&metric.source_key);
                    continue;
                }
            };
            match metric.combine {
                CombinePolicy::Sum => {
                    *series.entry(*timestamp).or_insert(0.0) += value;
                }
                CombinePolicy::Overwrite => {
                    series.insert(*timestamp, value);
                }
            }
        }
    }

    if series.len() < window.min_expected_samples {
        warn!(
            key = %metric.source_key,
            window = %window.name,
            have = series.len(),
            expected = window.min_expected_samples,
            "Reconciled series is sparser than expected"
        );
        obs::record_gap_warning(&metric.source_key);
    }

    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::fetch::RawSeries;

    fn metric(combine: CombinePolicy) -> MetricQuery {
        MetricQuery {
            source_key: "test_metric".to_string(),
            expression: "test_metric OR vector(0)".to_string(),
            combine,
        }
    }

    fn window(min_expected_samples: usize) -> WindowConfig {
        WindowConfig {
            name: "day".to_string(),
            lookback_secs: 24 * 3600,
            step_secs: 1800,
            min_expected_samples,
        }
    }

    fn raw_series(points: &[(i64, &str)]) -> RawSeries {
        RawSeries {
            labels: Default::default(),
            points: points.iter().map(|(t, v)| (*t, v.to_string())).collect(),
        }
    }

    fn success(series: Vec<RawSeries>) -> RawQueryResult {
        RawQueryResult {
            status: QueryStatus::Success,
            status_text: "success".to_string(),
            result_kind: "matrix".to_string(),
            series,
            warnings: Vec::new(),
            error_detail: None,
        }
    }

    #[test]
    fn test_overwrite_later_series_wins() {
        // Zero-filled baseline first, sparse real samples last.
        let result = success(vec![
            raw_series(&[(1000, "0"), (2000, "0")]),
            raw_series(&[(2000, "5")]),
        ]);

        let series = reconcile(&metric(CombinePolicy::Overwrite), &result, &window(2)).unwrap();

        assert_eq!(series.len(), 2);
        assert_eq!(series[&1000], 0.0);
        assert_eq!(series[&2000], 5.0);
    }

    #[test]
    fn test_sum_adds_overlapping_timestamps() {
        let result = success(vec![raw_series(&[(1000, "3")]), raw_series(&[(1000, "4")])]);

        let series = reconcile(&metric(CombinePolicy::Sum), &result, &window(1)).unwrap();

        assert_eq!(series.len(), 1);
        assert_eq!(series[&1000], 7.0);
    }

    #[test]
    fn test_unparseable_value_is_dropped_not_fatal() {
        let result = success(vec![raw_series(&[
            (1000, "1.5"),
            (2000, "NaN-garbage"),
            (3000, "2.5"),
        ])]);

        let series = reconcile(&metric(CombinePolicy::Overwrite), &result, &window(2)).unwrap();

        assert_eq!(series.len(), 2);
        assert_eq!(series[&1000], 1.5);
        assert_eq!(series[&3000], 2.5);
        assert!(!series.contains_key(&2000));
    }

    #[test]
    fn test_backend_error_status_fails() {
        let mut result = success(vec![]);
        result.status = QueryStatus::Error;
        result.status_text = "error".to_string();
        result.error_detail = Some("bad_data: parse error".to_string());

        let err = reconcile(&metric(CombinePolicy::Sum), &result, &window(1)).unwrap_err();
        assert!(matches!(err, VigilError::BackendStatus { .. }));
    }

    #[test]
    fn test_non_matrix_result_kind_fails() {
        let mut result = success(vec![]);
        result.result_kind = "vector".to_string();

        let err = reconcile(&metric(CombinePolicy::Sum), &result, &window(1)).unwrap_err();
        assert!(matches!(err, VigilError::UnexpectedShape { kind } if kind == "vector"));
    }

    #[test]
    fn test_sparse_series_succeeds_with_gap() {
        let result = success(vec![raw_series(&[(1000, "1")])]);

        // 48 expected, 1 delivered: tolerated, surfaced via logs only.
        let series = reconcile(&metric(CombinePolicy::Overwrite), &result, &window(48)).unwrap();
        assert_eq!(series.len(), 1);
    }

    #[test]
    fn test_no_fabricated_timestamps() {
        let result = success(vec![
            raw_series(&[(1000, "0"), (2000, "0")]),
            raw_series(&[(1500, "9")]),
        ]);

        let series = reconcile(&metric(CombinePolicy::Overwrite), &result, &window(1)).unwrap();

        for timestamp in series.keys() {
            let seen = result
                .series
                .iter()
                .flat_map(|s| s.points.iter())
                .any(|(t, _)| t == timestamp);
            assert!(seen, "timestamp {} not present in any input series", timestamp);
        }
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let result = success(vec![
            raw_series(&[(1000, "0"), (2000, "0"), (3000, "0")]),
            raw_series(&[(2000, "7")]),
        ]);
        let m = metric(CombinePolicy::Overwrite);
        let w = window(3);

        let first = reconcile(&m, &result, &w).unwrap();
        let second = reconcile(&m, &result, &w).unwrap();
        assert_eq!(first, second);

        let first_json = serde_json::to_vec(&first).unwrap();
        let second_json = serde_json::to_vec(&second).unwrap();
        assert_eq!(first_json, second_json);
    }
}
