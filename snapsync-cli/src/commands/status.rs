use snapsync::store::SnapshotStore;
use snapsync::types::SyncOutcome;
use snapsync_config::shared::SnapsyncConfig;
use tracing::{info, warn};

use crate::commands::{open_store, table_schema};
use crate::error::CliResult;

/// Logs the status recorded by the latest sync cycle.
pub async fn run(config: SnapsyncConfig) -> CliResult<()> {
    let store = open_store(&config, table_schema(&config));

    let Some(status) = store.read_status().await? else {
        info!(
            path = %store.metadata_path().display(),
            "no sync cycle has been recorded yet"
        );
        return Ok(());
    };

    match status.outcome {
        SyncOutcome::Error => warn!(
            timestamp = %status.timestamp,
            outcome = %status.outcome,
            records = status.record_count,
            error = status.error.as_deref().unwrap_or_default(),
            "last sync cycle failed"
        ),
        SyncOutcome::Ok | SyncOutcome::NoChange => info!(
            timestamp = %status.timestamp,
            outcome = %status.outcome,
            records = status.record_count,
            version = %status.version,
            changes_detected = status.changes_detected,
            "last sync cycle succeeded"
        ),
    }

    Ok(())
}
