//! JSON dumps of a source table, taken before destructive runs.

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use tokio::fs;
use tracing::info;

use crate::error::SyncResult;
use crate::scan::TableScanner;
use crate::source::SourceTable;
use crate::types::raw_record_to_json;

/// Timestamp format of backup file names.
const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// A backup written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupReport {
    pub path: PathBuf,
    pub records: usize,
}

/// File name of a backup of `table_name` taken at `timestamp`.
pub fn backup_file_name(table_name: &str, timestamp: NaiveDateTime) -> String {
    format!(
        "respaldo_{table_name}_{}.json",
        timestamp.format(BACKUP_TIMESTAMP_FORMAT)
    )
}

/// Writes every item of `source` to a JSON array in `directory`.
///
/// Numbers are written as strings so that no precision is lost.
pub async fn backup_table<S>(
    source: &S,
    directory: &Path,
    timestamp: NaiveDateTime,
) -> SyncResult<BackupReport>
where
    S: SourceTable + Sync,
{
    let records = TableScanner::new(source).collect().await?;

    let items: Vec<serde_json::Value> = records.iter().map(raw_record_to_json).collect();
    let bytes = serde_json::to_vec_pretty(&items)?;

    fs::create_dir_all(directory).await?;
    let path = directory.join(backup_file_name(source.name(), timestamp));
    fs::write(&path, bytes).await?;

    info!(
        table = source.name(),
        path = %path.display(),
        records = records.len(),
        "table backup written"
    );

    Ok(BackupReport {
        path,
        records: records.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::memory::MemorySourceTable;
    use crate::test_utils::records::{offers, test_timestamp};

    #[tokio::test]
    async fn backup_contains_every_item() {
        let dir = tempfile::tempdir().unwrap();
        let table = MemorySourceTable::new("ofertas_trabajo", vec!["ID_Oferta".to_string()]);
        table.insert(offers(3)).await.unwrap();

        let report = backup_table(&table, dir.path(), test_timestamp())
            .await
            .unwrap();

        assert_eq!(
            report.path.file_name().unwrap(),
            "respaldo_ofertas_trabajo_20240307_093000.json"
        );
        assert_eq!(report.records, 3);
        let items: Vec<serde_json::Value> =
            serde_json::from_slice(&std::fs::read(&report.path).unwrap()).unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0]["ID_Oferta"], "of-000");
    }
}
