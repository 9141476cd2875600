//! Observability infrastructure: tracing and process metrics.

use crate::error::{Result, VigilError};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod metrics;

/// Port the Prometheus exporter listens on.
pub const METRICS_PORT: u16 = 9464;

/// Initialize the global observability infrastructure.
///
/// This must be called once at process startup before any other operations.
pub fn init() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with(tracing_subscriber::fmt::layer().with_target(true).with_level(true))
        .init();

    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], METRICS_PORT))
        .install()
        .map_err(|e| VigilError::InvalidConfig {
            reason: format!("Failed to install metrics exporter: {}", e),
        })?;

    metrics::register_core_metrics();

    tracing::info!("Observability initialized (metrics exporter on :{})", METRICS_PORT);
    Ok(())
}
