//! Configuration management.

use crate::error::{Result, VigilError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Role a vigil instance plays in a deployment.
///
/// A manager produces all artifacts; a worker only mirrors the manager's
/// static directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Manager,
    Worker,
}

impl Role {
    /// Parse a role from string, defaulting to manager.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "worker" => Role::Worker,
            _ => Role::Manager,
        }
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Manager => "manager",
            Role::Worker => "worker",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How multiple raw series for one metric are combined per timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CombinePolicy {
    /// Values for an already-seen timestamp are added together.
    Sum,
    /// The last value written for a timestamp wins. Series later in the
    /// response take priority, so a sparse authoritative series must be
    /// listed after its zero-filled baseline.
    Overwrite,
}

impl CombinePolicy {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Overwrite => "overwrite",
        }
    }
}

impl std::fmt::Display for CombinePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One named metric to sync from the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricQuery {
    /// Key the reconciled series is stored under in the snapshot.
    pub source_key: String,
    /// Backend query expression. Treated as opaque; any scaling factors
    /// live inside the expression itself.
    pub expression: String,
    /// Combination policy for overlapping timestamps.
    pub combine: CombinePolicy,
}

/// A named rolling time range with its own sampling cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Window name, also the snapshot file prefix (e.g. "day", "week").
    pub name: String,
    /// How far into the past each pass looks, in seconds.
    pub lookback_secs: u64,
    /// Sample step of the range query, in seconds.
    pub step_secs: u64,
    /// Expected number of samples (roughly lookback / step). Only a
    /// density sanity check; sparser results are surfaced, not rejected.
    pub min_expected_samples: usize,
}

impl WindowConfig {
    /// Lookback duration of this window.
    pub fn lookback(&self) -> Duration {
        Duration::from_secs(self.lookback_secs)
    }

    /// Sample step of this window.
    pub fn step(&self) -> Duration {
        Duration::from_secs(self.step_secs)
    }
}

/// Persistent configuration for vigil.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub role: Role,

    /// Base URL of the Prometheus-compatible metrics backend.
    pub backend_url: String,
    /// Directory all artifacts are written into.
    pub static_dir: String,
    /// Seconds between history passes for every window.
    pub history_interval_secs: u64,
    pub windows: Vec<WindowConfig>,
    pub metrics: Vec<MetricQuery>,

    /// Broker the forecast service publishes observations on.
    pub broker_url: String,
    pub broker_username: Option<String>,
    pub broker_password: Option<String>,
    /// Namespace prefix of the observation topics (`<prefix>/<station>`).
    pub topic_prefix: String,

    /// Base URL of the station inventory API.
    pub inventory_url: String,
    /// Filter expression passed to the inventory query.
    pub inventory_filter: String,
    pub inventory_interval_secs: u64,

    pub status_interval_secs: u64,
    /// Grace period before the first status pass so the stores can fill.
    pub status_initial_delay_secs: u64,

    /// Worker hostname to push produced files to. Push is disabled when unset.
    pub worker_host: Option<String>,
    pub worker_port: u16,
    pub worker_auth_user: String,
    pub worker_auth_pass: String,

    /// Static URL of the manager, used by workers to pull files.
    pub manager_static_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            role: Role::Manager,
            backend_url: "http://localhost:9090".to_string(),
            static_dir: "./static".to_string(),
            history_interval_secs: 60,
            windows: vec![
                WindowConfig {
                    name: "day".to_string(),
                    lookback_secs: 24 * 3600,
                    step_secs: 30 * 60,
                    min_expected_samples: 48,
                },
                WindowConfig {
                    name: "week".to_string(),
                    lookback_secs: 7 * 24 * 3600,
                    step_secs: 120 * 60,
                    min_expected_samples: 84,
                },
            ],
            metrics: vec![
                // Good forecasts published with usable quality. The two
                // bucket sums overlap, so overlapping timestamps are added.
                // "OR vector(0)" keeps the backend from returning an empty
                // result when it has no data for the range.
                MetricQuery {
                    source_key: "forecast_service_good_forecast_total".to_string(),
                    expression: "sum(increase(forecast_service_quality_distribution_bucket\
                                 {le=\"+Inf\"}[1800s]) / 15 / 2)-\
                                 sum(increase(forecast_service_quality_distribution_bucket\
                                 {le=\"50.0\"}[1800s]) / 15 / 2) OR vector(0)"
                        .to_string(),
                    combine: CombinePolicy::Sum,
                },
                // All subscriptions that could produce a forecast. The
                // zero-filled vector comes first in the response, the real
                // samples last, so real data wins.
                MetricQuery {
                    source_key: "forecast_service_subscription_count_total".to_string(),
                    expression: "forecast_service_subscription_count_total OR vector(0)"
                        .to_string(),
                    combine: CombinePolicy::Overwrite,
                },
            ],
            broker_url: "tcp://localhost:1883".to_string(),
            broker_username: None,
            broker_password: None,
            topic_prefix: "stations".to_string(),
            inventory_url: "http://localhost:8080/v1.1/".to_string(),
            inventory_filter: String::new(),
            inventory_interval_secs: 3600,
            status_interval_secs: 60,
            status_initial_delay_secs: 20,
            worker_host: None,
            worker_port: 8000,
            worker_auth_user: String::new(),
            worker_auth_pass: String::new(),
            manager_static_url: "http://localhost:8000/static".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from disk, falling back to defaults when the file
    /// does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| VigilError::InvalidConfig {
            reason: format!("Failed to read config: {}", e),
        })?;
        serde_json::from_str(&content).map_err(|e| VigilError::InvalidConfig {
            reason: format!("Failed to parse config: {}", e),
        })
    }

    /// Save configuration to disk.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| VigilError::IoError { path: parent.to_path_buf(), source: e })?;
        }
        let content = serde_json::to_string_pretty(self).map_err(|e| VigilError::Serialize {
            reason: format!("Failed to serialize config: {}", e),
        })?;
        std::fs::write(path, content)
            .map_err(|e| VigilError::IoError { path: path.to_path_buf(), source: e })
    }

    /// Apply deploy-time environment overrides on top of the loaded file.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("VIGIL_ROLE") {
            self.role = Role::parse(&v);
        }
        if let Ok(v) = std::env::var("VIGIL_BACKEND_URL") {
            self.backend_url = v;
        }
        if let Ok(v) = std::env::var("VIGIL_STATIC_DIR") {
            self.static_dir = v;
        }
        if let Ok(v) = std::env::var("VIGIL_BROKER_URL") {
            self.broker_url = v;
        }
        if let Ok(v) = std::env::var("VIGIL_BROKER_USERNAME") {
            self.broker_username = Some(v);
        }
        if let Ok(v) = std::env::var("VIGIL_BROKER_PASSWORD") {
            self.broker_password = Some(v);
        }
        if let Ok(v) = std::env::var("VIGIL_INVENTORY_URL") {
            self.inventory_url = v;
        }
        if let Ok(v) = std::env::var("VIGIL_INVENTORY_FILTER") {
            self.inventory_filter = v;
        }
        if let Ok(v) = std::env::var("VIGIL_WORKER_HOST") {
            self.worker_host = Some(v);
        }
        if let Ok(v) = std::env::var("VIGIL_WORKER_PORT") {
            if let Ok(port) = v.parse() {
                self.worker_port = port;
            }
        }
        if let Ok(v) = std::env::var("VIGIL_WORKER_AUTH_USER") {
            self.worker_auth_user = v;
        }
        if let Ok(v) = std::env::var("VIGIL_WORKER_AUTH_PASS") {
            self.worker_auth_pass = v;
        }
        if let Ok(v) = std::env::var("VIGIL_MANAGER_STATIC_URL") {
            self.manager_static_url = v;
        }
    }
}
