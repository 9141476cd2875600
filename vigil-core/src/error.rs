//! Error types for vigil.
//!
//! All errors use `thiserror` for ergonomic error handling and proper error chains.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for vigil operations.
pub type Result<T> = std::result::Result<T, VigilError>;

/// Main error type for vigil.
#[derive(Error, Debug)]
pub enum VigilError {
    // Metrics backend errors
    #[error("Range query transport failure: {source}")]
    Transport {
        #[source]
        source: reqwest::Error,
    },

    #[error("Could not decode backend response: {reason}")]
    Decode { reason: String },

    #[error("Backend reported status {status}")]
    BackendStatus { status: String, detail: Option<String> },

    #[error("Unexpected result kind {kind:?}, expected a range matrix")]
    UnexpectedShape { kind: String },

    #[error("History pass aborted, metric {failed_key} did not reconcile")]
    PartialFailure { failed_key: String },

    // Broker errors
    #[error("Broker connection failed: {reason}")]
    Broker { reason: String },

    // Inventory and replication errors
    #[error("Upstream returned status {status} for {url}")]
    UpstreamStatus { status: u16, url: String },

    #[error("Could not resolve host {host}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Station {name} has unusable geometry: {reason}")]
    InvalidStation { name: String, reason: String },

    #[error("Could not parse timestamp {value:?}: {reason}")]
    InvalidTimestamp { value: String, reason: String },

    // Configuration and I/O errors
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("I/O error at {path:?}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {reason}")]
    Serialize { reason: String },
}
