use chrono::Local;
use snapsync::backup::backup_table;
use snapsync_config::shared::SnapsyncConfig;
use tracing::info;

use crate::commands::{open_source, table_schema};
use crate::error::CliResult;

/// Dumps every item of the source table into the backup directory.
pub async fn run(config: SnapsyncConfig) -> CliResult<()> {
    let schema = table_schema(&config);
    let source = open_source(&config, &schema).await?;

    let report = backup_table(
        &source,
        &config.delete.backup_directory,
        Local::now().naive_local(),
    )
    .await?;
    info!(path = %report.path.display(), records = report.records, "backup finished");

    Ok(())
}
