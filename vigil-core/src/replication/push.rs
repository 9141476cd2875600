//! Push produced files to worker hosts.

use crate::error::{Result, VigilError};
use crate::observability::metrics as obs;
use std::net::IpAddr;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Attempts per host before a file is given up on.
const PUSH_ATTEMPTS: u32 = 2;

/// Pushes files to every address behind the worker hostname.
pub struct WorkerPusher {
    client: reqwest::Client,
    host: String,
    port: u16,
    username: String,
    password: String,
}

impl WorkerPusher {
    /// Create a pusher for the given worker hostname and upload port.
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| VigilError::InvalidConfig {
                reason: format!("Failed to create HTTP client: {}", e),
            })?;
        Ok(Self {
            client,
            host: host.into(),
            port,
            username: username.into(),
            password: password.into(),
        })
    }

    /// Resolve every address behind the worker hostname. In a scaled
    /// deployment the name resolves to one address per worker replica.
    async fn worker_hosts(&self) -> Result<Vec<IpAddr>> {
        let addrs = tokio::net::lookup_host((self.host.as_str(), self.port))
            .await
            .map_err(|e| VigilError::Resolve { host: self.host.clone(), source: e })?;
        Ok(addrs.map(|addr| addr.ip()).collect())
    }

    /// Push one file to every worker, with bounded retry per host.
    /// Failures are logged; the caller's artifact loop continues either way.
    pub async fn push_file(&self, bytes: &[u8], rel_path: &str) {
        let hosts = match self.worker_hosts().await {
            Ok(hosts) => hosts,
            Err(e) => {
                warn!(error = %e, "Could not resolve worker hosts");
                obs::record_push_failure();
                return;
            }
        };

        for host in hosts {
            let url = format!("http://{}:{}/upload/{}", host, self.port, rel_path);
            let mut attempts_left = PUSH_ATTEMPTS;
            loop {
                match self.try_push(&url, bytes).await {
                    Ok(()) => {
                        debug!(%url, "Pushed file");
                        break;
                    }
                    Err(e) => {
                        attempts_left -= 1;
                        if attempts_left == 0 {
                            error!(%url, error = %e, "Could not push file, giving up");
                            obs::record_push_failure();
                            break;
                        }
                        warn!(%url, error = %e, "Push failed, retrying");
                        // 1-5s of jitter spreads retries across the fleet.
                        let wait = Duration::from_secs_f64(1.0 + 4.0 * rand::random::<f64>());
                        tokio::time::sleep(wait).await;
                    }
                }
            }
        }
    }

    async fn try_push(&self, url: &str, bytes: &[u8]) -> Result<()> {
        let response = self
            .client
            .put(url)
            .basic_auth(&self.username, Some(&self.password))
            .header(reqwest::header::CONTENT_TYPE, "application/binary")
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| VigilError::Transport { source: e })?;

        if !response.status().is_success() {
            return Err(VigilError::UpstreamStatus {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolves_localhost() {
        let pusher = WorkerPusher::new("localhost", 8000, "user", "pass").unwrap();
        let hosts = pusher.worker_hosts().await.unwrap();
        assert!(!hosts.is_empty());
    }

    #[tokio::test]
    async fn test_unresolvable_host_is_an_error() {
        let pusher =
            WorkerPusher::new("definitely-not-a-real-host.invalid", 8000, "user", "pass").unwrap();
        assert!(pusher.worker_hosts().await.is_err());
    }
}
