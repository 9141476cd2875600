//! Filesystem helpers shared by the snapshot and status writers.

use crate::error::{Result, VigilError};
use std::path::Path;
use tokio::fs;

/// Write `bytes` to `path` atomically: temp file in the same directory,
/// then rename over the destination. A concurrent reader sees either the
/// previous content or the new content, never a partial file.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| VigilError::IoError { path: parent.to_path_buf(), source: e })?;
    }

    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, bytes)
        .await
        .map_err(|e| VigilError::IoError { path: temp_path.clone(), source: e })?;

    fs::rename(&temp_path, path)
        .await
        .map_err(|e| VigilError::IoError { path: path.to_path_buf(), source: e })?;

    Ok(())
}
