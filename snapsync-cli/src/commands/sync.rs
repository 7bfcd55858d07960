use snapsync::concurrency::shutdown::{ShutdownTx, create_shutdown_channel};
use snapsync::sync::{SyncOrchestrator, interval_from_minutes};
use snapsync_config::shared::SnapsyncConfig;
use snapsync_telemetry::metrics::init_metrics;
use tokio::signal::unix::{SignalKind, signal};
use tracing::info;

use crate::commands::{open_source, open_store, table_schema};
use crate::error::{CliError, CliResult};

/// How often `snapsync sync` runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// A single cycle whose outcome decides the exit code.
    Once,
    /// A cycle every given number of minutes until SIGINT or SIGTERM.
    Every(u64),
}

/// Runs one sync cycle or keeps syncing on an interval.
pub async fn run(config: SnapsyncConfig, schedule: Schedule) -> CliResult<()> {
    let schema = table_schema(&config);
    let source = open_source(&config, &schema).await?;
    let store = open_store(&config, schema.clone());
    let orchestrator = SyncOrchestrator::new(source, store, schema, &config.sync);

    match schedule {
        Schedule::Once => {
            orchestrator.run_cycle().await.into_result()?;
        }
        Schedule::Every(minutes) => {
            let interval = interval_from_minutes(minutes)?;

            if let Some(metrics) = &config.metrics {
                init_metrics(metrics.port, env!("CARGO_BIN_NAME")).map_err(CliError::config)?;
                info!(port = metrics.port, "metrics exporter listening");
            }

            let (shutdown_tx, shutdown_rx) = create_shutdown_channel();
            let listener = spawn_shutdown_listener(shutdown_tx)?;

            let cycles = orchestrator.run_on_interval(interval, shutdown_rx).await;
            listener.abort();

            info!(cycles, "scheduled sync stopped");
        }
    }

    Ok(())
}

/// Requests shutdown on SIGINT or SIGTERM.
fn spawn_shutdown_listener(shutdown_tx: ShutdownTx) -> CliResult<tokio::task::JoinHandle<()>> {
    let mut sigterm = signal(SignalKind::terminate())?;

    Ok(tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("sigint (ctrl+c) received, stopping after the current cycle");
            }
            _ = sigterm.recv() => {
                info!("sigterm received, stopping after the current cycle");
            }
        }

        shutdown_tx.shutdown();
    }))
}
