//! Broker subscriber that feeds the observation store.

use super::store::ObservationStore;
use super::Observation;
use crate::error::{Result, VigilError};
use crate::observability::metrics as obs;
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Messages buffered between the network event loop and the client.
const CHANNEL_CAPACITY: usize = 64;

/// Subscribes to every observation topic and keeps the store current.
pub struct ObservationListener {
    store: Arc<ObservationStore>,
    options: MqttOptions,
}

impl ObservationListener {
    /// Build the broker connection options.
    ///
    /// `broker_url` accepts `mqtt://`, `mqtts://` or `tcp://` schemes, or a
    /// bare `host:port`.
    pub fn new(
        broker_url: &str,
        username: Option<&str>,
        password: Option<&str>,
        store: Arc<ObservationStore>,
    ) -> Result<Self> {
        let (host, port) = parse_broker_url(broker_url)?;
        let client_id = format!("vigil-monitor-{}", uuid::Uuid::new_v4());
        info!(%host, port, client_id = %client_id, "Configuring broker connection");

        let mut options = MqttOptions::new(client_id, host, port);
        options.set_keep_alive(Duration::from_secs(60));
        if let (Some(user), Some(pass)) = (username, password) {
            options.set_credentials(user, pass);
        }

        Ok(Self { store, options })
    }

    /// Run the subscriber until shutdown.
    ///
    /// A lost connection is returned as an error: the supervisor restarts
    /// the process, which re-establishes a clean broker session.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
        let (client, mut eventloop) = AsyncClient::new(self.options.clone(), CHANNEL_CAPACITY);

        let mut report = tokio::time::interval(Duration::from_secs(60));
        report.tick().await; // the first tick fires immediately

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Observation listener stopping");
                    return Ok(());
                }
                _ = report.tick() => {
                    info!(
                        received = self.store.received_total().await,
                        "Observations received since startup"
                    );
                }
                event = eventloop.poll() => match event {
                    Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                        info!("Connected to forecast broker");
                        client
                            .subscribe("#", QoS::AtLeastOnce)
                            .await
                            .map_err(|e| VigilError::Broker { reason: e.to_string() })?;
                    }
                    Ok(Event::Incoming(Incoming::Publish(publish))) => {
                        self.handle_publish(&publish.topic, &publish.payload).await;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        return Err(VigilError::Broker { reason: e.to_string() });
                    }
                }
            }
        }
    }

    /// Decode one publish and update the store. Undecodable payloads are
    /// logged and skipped.
    async fn handle_publish(&self, topic: &str, payload: &[u8]) {
        let observation: Observation = match serde_json::from_slice(payload) {
            Ok(observation) => observation,
            Err(e) => {
                warn!(%topic, error = %e, "Could not decode observation");
                return;
            }
        };

        let start_time = match observation.start_time_unix() {
            Ok(timestamp) => Some(timestamp),
            Err(e) => {
                warn!(%topic, error = %e, "Could not parse observation start time");
                None
            }
        };

        self.store.upsert(topic, observation, start_time).await;
        obs::record_observation();
        debug!(%topic, "Stored observation");
    }
}

/// Split a broker URL into host and port.
fn parse_broker_url(url: &str) -> Result<(String, u16)> {
    let stripped = url
        .strip_prefix("mqtt://")
        .or_else(|| url.strip_prefix("mqtts://"))
        .or_else(|| url.strip_prefix("tcp://"))
        .unwrap_or(url);

    let (host, port) = stripped.rsplit_once(':').ok_or_else(|| VigilError::InvalidConfig {
        reason: format!("Broker url {} has no port", url),
    })?;
    let port: u16 = port.parse().map_err(|_| VigilError::InvalidConfig {
        reason: format!("Broker url {} has an invalid port", url),
    })?;

    Ok((host.to_string(), port))
}
