//! vigild - the vigil monitoring daemon.
//!
//! A manager instance ingests observations, syncs the station inventory,
//! writes status artifacts and syncs metric history. A worker instance only
//! mirrors the manager's static directory.

use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{error, info};
use vigil_core::{
    observability, Config, HistoryScheduler, HistorySnapshotBuilder, InventorySync,
    ObservationListener, ObservationStore, PullWorker, RangeClient, Role, StationStore,
    StatusWriter, WorkerPusher,
};

mod shutdown;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init().context("Failed to initialize observability")?;

    let config_path =
        std::env::var("VIGIL_CONFIG").unwrap_or_else(|_| "vigil.json".to_string());
    let mut config = Config::load(&config_path).context("Failed to load configuration")?;
    config.apply_env_overrides();

    info!(
        role = %config.role,
        static_dir = %config.static_dir,
        "Vigil starting"
    );

    let shutdown = shutdown::shutdown_channel();

    match config.role {
        Role::Manager => run_manager(config, &shutdown).await?,
        Role::Worker => run_worker(config, &shutdown).await?,
    }

    info!("Vigil stopped");
    Ok(())
}

/// Run the full manager: listener, inventory sync, status monitor and
/// history scheduler.
async fn run_manager(config: Config, shutdown: &broadcast::Sender<()>) -> anyhow::Result<()> {
    let observations = Arc::new(ObservationStore::new());
    let stations = Arc::new(StationStore::new());

    // Observation listener
    let listener = ObservationListener::new(
        &config.broker_url,
        config.broker_username.as_deref(),
        config.broker_password.as_deref(),
        observations.clone(),
    )
    .context("Failed to configure the broker listener")?;
    let listener_handle = tokio::spawn(listener.run(shutdown.subscribe()));

    // Inventory sync
    let inventory = InventorySync::new(
        &config.inventory_url,
        &config.inventory_filter,
        &config.topic_prefix,
        stations.clone(),
        Duration::from_secs(config.inventory_interval_secs),
    )
    .context("Failed to configure the inventory sync")?;
    tokio::spawn(inventory.run(shutdown.subscribe()));

    // Status writers, optionally pushing to the workers
    let pusher = match &config.worker_host {
        Some(host) => Some(Arc::new(
            WorkerPusher::new(
                host,
                config.worker_port,
                &config.worker_auth_user,
                &config.worker_auth_pass,
            )
            .context("Failed to configure the worker pusher")?,
        )),
        None => None,
    };
    let status = StatusWriter::new(
        &config.static_dir,
        stations.clone(),
        observations.clone(),
        pusher,
    );
    tokio::spawn(status.run(
        Duration::from_secs(config.status_initial_delay_secs),
        Duration::from_secs(config.status_interval_secs),
        shutdown.subscribe(),
    ));

    // History scheduler, one task per window
    let querier = Arc::new(
        RangeClient::new(&config.backend_url).context("Failed to configure the range client")?,
    );
    let builder = Arc::new(HistorySnapshotBuilder::new(querier, &config.static_dir));
    let scheduler =
        HistoryScheduler::new(builder, Duration::from_secs(config.history_interval_secs));
    let _window_tasks = scheduler.spawn(config.windows.clone(), config.metrics.clone(), shutdown);

    info!("Vigil manager ready");

    // The listener ending on its own means the broker connection is gone;
    // exit non-zero so the supervisor restarts us with a clean session.
    let mut shutdown_rx = shutdown.subscribe();
    tokio::select! {
        _ = shutdown_rx.recv() => {}
        result = listener_handle => {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(error = %e, "Observation listener failed");
                    return Err(e.into());
                }
                Err(e) => {
                    error!(error = %e, "Observation listener panicked");
                    return Err(e.into());
                }
            }
        }
    }

    Ok(())
}

/// Run a worker: mirror the manager's static directory.
async fn run_worker(config: Config, shutdown: &broadcast::Sender<()>) -> anyhow::Result<()> {
    let worker = PullWorker::new(&config.manager_static_url, &config.static_dir)
        .context("Failed to configure the pull worker")?;

    info!("Vigil worker ready");
    worker.run(shutdown.subscribe()).await;
    Ok(())
}
