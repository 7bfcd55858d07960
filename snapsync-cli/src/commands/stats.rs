use chrono::Local;
use snapsync::conversions::normalize::FieldNormalizer;
use snapsync::error::SyncError;
use snapsync::scan::TableScanner;
use snapsync::store::SnapshotStore;
use snapsync::summary::DatasetSummary;
use snapsync::types::Snapshot;
use snapsync_config::shared::SnapsyncConfig;
use tracing::info;

use crate::commands::{open_source, open_store, table_schema};
use crate::error::CliResult;

/// Logs a summary of the published snapshot, or of the live table with `live`.
pub async fn run(config: SnapsyncConfig, live: bool) -> CliResult<()> {
    let schema = table_schema(&config);

    let snapshot = if live {
        let source = open_source(&config, &schema).await?;
        let records = TableScanner::new(&source)
            .collect()
            .await
            .map_err(SyncError::from)?;
        let normalizer = FieldNormalizer::new(schema.clone());
        let canonical = records
            .iter()
            .map(|record| normalizer.normalize(record))
            .collect();

        Snapshot::new(schema, canonical, Local::now().naive_local())
    } else {
        open_store(&config, schema).read_last().await?
    };

    info!(
        live,
        version = %snapshot.version(),
        synced_at = %snapshot.synced_at(),
        "summarizing snapshot"
    );
    DatasetSummary::from_snapshot(&snapshot).log();

    Ok(())
}
