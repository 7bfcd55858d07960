use std::path::Path;

use chrono::Local;
use snapsync::backup::backup_table;
use snapsync::delete::{BatchDeleter, DeleteConfirmation, PurgeReport};
use snapsync::source::SourceTable;
use snapsync_config::shared::SnapsyncConfig;
use tracing::{info, warn};

use crate::commands::{open_source, table_schema};
use crate::error::{CliError, CliResult};

/// Empties the source table, optionally backing it up first.
///
/// Fails with [`CliError::IncompleteDeletion`] when items remain after the run.
pub async fn run(
    config: SnapsyncConfig,
    confirmation: DeleteConfirmation,
    backup: bool,
) -> CliResult<()> {
    let schema = table_schema(&config);
    let source = open_source(&config, &schema).await?;
    let deleter = BatchDeleter::new(source, schema.key().to_vec());

    let backup_directory = backup.then_some(config.delete.backup_directory.as_path());
    let report = backup_and_purge(&deleter, &confirmation, backup_directory).await?;

    info!(
        dry_run = report.deletion.dry_run,
        before = report.before,
        after = ?report.after,
        planned = report.deletion.planned,
        succeeded = report.deletion.succeeded,
        failed = report.deletion.failed,
        failed_batches = report.deletion.failed_batches.len(),
        "purge finished"
    );

    if report.deletion.is_complete() {
        return Ok(());
    }

    let residual = report.deletion.residual_keys();
    for key in residual.iter().take(10) {
        warn!(key = %key, "item was not deleted");
    }

    Err(CliError::IncompleteDeletion {
        residual: residual.len(),
    })
}

/// Checks the confirmation, writes a backup into `backup_directory` when given, then purges.
async fn backup_and_purge<S>(
    deleter: &BatchDeleter<S>,
    confirmation: &DeleteConfirmation,
    backup_directory: Option<&Path>,
) -> CliResult<PurgeReport>
where
    S: SourceTable + Sync,
{
    let source = deleter.source();
    confirmation.authorize(source.name())?;

    if let Some(directory) = backup_directory {
        let timestamp = Local::now().naive_local();
        let report = backup_table(source, directory, timestamp).await?;
        info!(
            path = %report.path.display(),
            records = report.records,
            "backup taken before deletion"
        );
    }

    Ok(deleter.purge(confirmation).await?)
}

#[cfg(test)]
mod tests {
    use snapsync::error::ErrorKind;
    use snapsync::source::memory::MemorySourceTable;
    use snapsync::types::{RawRecord, RawValue};

    use super::*;

    const TABLE: &str = "ofertas_trabajo";

    async fn deleter(count: usize) -> BatchDeleter<MemorySourceTable> {
        let table = MemorySourceTable::new(TABLE, vec!["ID_Oferta".to_string()]);
        table
            .insert((0..count).map(|i| {
                RawRecord::from([("ID_Oferta".to_string(), RawValue::from(format!("of-{i}")))])
            }))
            .await
            .unwrap();
        BatchDeleter::new(table, vec!["ID_Oferta".to_string()])
    }

    #[tokio::test]
    async fn wrong_confirmation_skips_the_backup() {
        let dir = tempfile::tempdir().unwrap();
        let deleter = deleter(3).await;

        let err = backup_and_purge(
            &deleter,
            &DeleteConfirmation::Confirmed("other_table".to_string()),
            Some(dir.path()),
        )
        .await
        .unwrap_err();

        let CliError::Sync(err) = err else {
            panic!("expected a sync error");
        };
        assert_eq!(err.kind(), ErrorKind::ConfirmationMismatch);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        assert_eq!(deleter.source().len().await, 3);
    }

    #[tokio::test]
    async fn confirmed_run_backs_up_then_purges() {
        let dir = tempfile::tempdir().unwrap();
        let deleter = deleter(3).await;

        let report = backup_and_purge(
            &deleter,
            &DeleteConfirmation::Confirmed(TABLE.to_string()),
            Some(dir.path()),
        )
        .await
        .unwrap();

        assert_eq!(report.before, 3);
        assert_eq!(report.after, Some(0));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
        assert!(deleter.source().is_empty().await);
    }
}
