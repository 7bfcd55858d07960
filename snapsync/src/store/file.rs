//! Snapshot store backed by a CSV body and a JSON metadata document in one directory.

use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use snapsync_config::shared::StoreConfig;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::conversions::normalize::FieldNormalizer;
use crate::enrich::Enricher;
use crate::error::{ErrorKind, SyncError, SyncResult};
use crate::failpoints::{
    FILE_STORE__AFTER_BODY_WRITE, FILE_STORE__BEFORE_BODY_RENAME, sync_fail_point,
};
use crate::schema::TableSchema;
use crate::store::base::SnapshotStore;
use crate::store::body;
use crate::sync_error;
use crate::types::{Snapshot, SyncOutcome, SyncStatus, VersionTag};

/// Metadata document written next to the snapshot body.
#[derive(Debug, Serialize, Deserialize)]
struct MetadataDocument {
    ultima_sync: NaiveDateTime,
    status: SyncOutcome,
    total_registros: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    /// Always written. Documents from older releases may lack it.
    #[serde(default)]
    version: Option<VersionTag>,
    cambios_detectados: bool,
    archivo_csv: String,
    columnas: Vec<String>,
}

impl MetadataDocument {
    fn into_status(self) -> SyncStatus {
        SyncStatus {
            timestamp: self.ultima_sync,
            outcome: self.status,
            record_count: self.total_registros,
            error: self.error,
            version: self
                .version
                .unwrap_or_else(|| VersionTag::from_timestamp(self.ultima_sync)),
            changes_detected: self.cambios_detectados,
        }
    }
}

/// [`SnapshotStore`] persisting to the local file system.
///
/// Every file is replaced atomically: its new content is written to a sibling temporary
/// file, flushed to disk and renamed over the target. The body is replaced before the
/// metadata, so a failure in between leaves a consistent body with stale metadata, never
/// metadata describing a missing or partial body.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    directory: PathBuf,
    snapshot_file: String,
    metadata_file: String,
    retain_versions: usize,
    write_bom: bool,
    normalizer: FieldNormalizer,
    enricher: Option<Enricher>,
}

impl FileSnapshotStore {
    pub fn new(config: &StoreConfig, schema: Arc<TableSchema>) -> Self {
        let enricher = config
            .enrichment
            .enabled
            .then(|| Enricher::new(&schema, &config.enrichment));

        Self {
            directory: config.directory.clone(),
            snapshot_file: config.snapshot_file.clone(),
            metadata_file: config.metadata_file.clone(),
            retain_versions: config.retain_versions,
            write_bom: config.write_bom,
            normalizer: FieldNormalizer::new(schema),
            enricher,
        }
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.directory.join(&self.snapshot_file)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.directory.join(&self.metadata_file)
    }

    fn schema(&self) -> &Arc<TableSchema> {
        self.normalizer.schema()
    }

    fn metadata_document(&self, status: &SyncStatus) -> MetadataDocument {
        MetadataDocument {
            ultima_sync: status.timestamp,
            status: status.outcome,
            total_registros: status.record_count,
            error: status.error.clone(),
            version: Some(status.version.clone()),
            cambios_detectados: status.changes_detected,
            archivo_csv: self.snapshot_file.clone(),
            columnas: body::headers(self.schema(), self.enricher.as_ref()),
        }
    }

    async fn write_metadata(&self, status: &SyncStatus) -> SyncResult<()> {
        let document = self.metadata_document(status);
        let bytes = serde_json::to_vec_pretty(&document)?;

        write_atomic(&self.metadata_path(), &bytes, None).await
    }

    /// Stem and extension of archived copies, `<stem>_<version>.<extension>`.
    fn archive_parts(&self) -> (&str, &str) {
        let path = Path::new(&self.snapshot_file);
        let stem = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(&self.snapshot_file);
        let extension = path
            .extension()
            .and_then(|extension| extension.to_str())
            .unwrap_or("csv");

        (stem, extension)
    }

    /// Keeps a versioned copy of `bytes` and removes the oldest copies beyond the limit.
    async fn archive(&self, version: &VersionTag, bytes: &[u8]) -> SyncResult<()> {
        let (stem, extension) = self.archive_parts();
        let archive_path = self
            .directory
            .join(format!("{stem}_{version}.{extension}"));
        write_atomic(&archive_path, bytes, None).await?;

        let prefix = format!("{stem}_");
        let suffix = format!(".{extension}");
        let mut archived = Vec::new();
        let mut entries = fs::read_dir(&self.directory).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let is_archive = name
                .strip_prefix(&prefix)
                .and_then(|rest| rest.strip_suffix(&suffix))
                .is_some_and(|tag| tag.parse::<VersionTag>().is_ok());
            if is_archive {
                archived.push(entry.path());
            }
        }

        // Version tags sort chronologically.
        archived.sort();
        let excess = archived.len().saturating_sub(self.retain_versions);
        for path in archived.into_iter().take(excess) {
            debug!(path = %path.display(), "removing archived snapshot");
            fs::remove_file(&path).await?;
        }

        Ok(())
    }

    /// Sync time of a body without rows, taken from the metadata or the file itself.
    async fn empty_body_version(&self, path: &Path) -> SyncResult<(VersionTag, NaiveDateTime)> {
        if let Some(status) = self.read_status().await?
            && status.outcome != SyncOutcome::Error
        {
            return Ok((status.version, status.timestamp));
        }

        let modified = fs::metadata(path).await?.modified()?;
        let synced_at = DateTime::<Local>::from(modified).naive_local();

        Ok((VersionTag::from_timestamp(synced_at), synced_at))
    }
}

impl SnapshotStore for FileSnapshotStore {
    async fn read_last(&self) -> SyncResult<Snapshot> {
        let path = self.snapshot_path();

        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == IoErrorKind::NotFound => {
                return Err(sync_error!(
                    ErrorKind::SnapshotNotFound,
                    "No snapshot has been published",
                    path.display()
                ));
            }
            Err(err) => return Err(err.into()),
        };

        let decoded = body::decode(&bytes, &self.normalizer).map_err(|err| {
            sync_error!(
                ErrorKind::SnapshotCorrupted,
                "Stored snapshot could not be parsed",
                path.display(),
                source: err
            )
        })?;

        let (version, synced_at) = match (decoded.version, decoded.synced_at) {
            (Some(version), Some(synced_at)) => (version, synced_at),
            _ => self.empty_body_version(&path).await?,
        };

        debug!(
            path = %path.display(),
            records = decoded.records.len(),
            %version,
            "read stored snapshot"
        );

        Ok(Snapshot::with_version(
            self.schema().clone(),
            decoded.records,
            version,
            synced_at,
        ))
    }

    async fn write(&self, snapshot: &Snapshot) -> SyncResult<()> {
        let publish = async {
            fs::create_dir_all(&self.directory).await?;

            let bytes = body::encode(snapshot, self.enricher.as_ref(), self.write_bom)?;
            write_atomic(
                &self.snapshot_path(),
                &bytes,
                Some(FILE_STORE__BEFORE_BODY_RENAME),
            )
            .await?;
            sync_fail_point(FILE_STORE__AFTER_BODY_WRITE, ErrorKind::StoreWriteFailure)?;

            self.write_metadata(&SyncStatus::published(snapshot)).await?;

            Ok::<_, SyncError>(bytes)
        };

        let bytes = publish.await.map_err(store_write_failure)?;

        info!(
            path = %self.snapshot_path().display(),
            records = snapshot.record_count(),
            version = %snapshot.version(),
            "snapshot published"
        );

        if self.retain_versions > 0
            && let Err(err) = self.archive(snapshot.version(), &bytes).await
        {
            warn!(error = %err.summary(), "failed to archive snapshot copy");
        }

        Ok(())
    }

    async fn write_status(&self, status: &SyncStatus) -> SyncResult<()> {
        let write = async {
            fs::create_dir_all(&self.directory).await?;
            self.write_metadata(status).await
        };
        write.await.map_err(store_write_failure)?;

        debug!(
            path = %self.metadata_path().display(),
            outcome = %status.outcome,
            "status recorded"
        );

        Ok(())
    }

    async fn read_status(&self) -> SyncResult<Option<SyncStatus>> {
        let path = self.metadata_path();

        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == IoErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let document: MetadataDocument = serde_json::from_slice(&bytes).map_err(|err| {
            sync_error!(
                ErrorKind::SnapshotCorrupted,
                "Stored metadata could not be parsed",
                path.display(),
                source: err
            )
        })?;

        Ok(Some(document.into_status()))
    }
}

/// Classifies a failed write as [`ErrorKind::StoreWriteFailure`], keeping failpoint errors
/// that already carry that kind unchanged.
fn store_write_failure(err: SyncError) -> SyncError {
    if err.kind() == ErrorKind::StoreWriteFailure {
        return err;
    }

    let detail = err.summary();
    sync_error!(
        ErrorKind::StoreWriteFailure,
        "Snapshot store write failed",
        detail = detail,
        source: err
    )
}

/// Replaces `path` with `bytes` through a flushed temporary file and a rename.
///
/// `fail_point` fires after the temporary file is complete, before the rename.
async fn write_atomic(path: &Path, bytes: &[u8], fail_point: Option<&str>) -> SyncResult<()> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("snapshot");
    let temp_path = path.with_file_name(format!(".{file_name}.tmp"));

    let result = async {
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        drop(file);

        if let Some(name) = fail_point {
            sync_fail_point(name, ErrorKind::StoreWriteFailure)?;
        }

        fs::rename(&temp_path, path).await?;

        Ok::<_, SyncError>(())
    }
    .await;

    if result.is_err()
        && let Err(err) = fs::remove_file(&temp_path).await
        && err.kind() != IoErrorKind::NotFound
    {
        warn!(path = %temp_path.display(), error = %err, "failed to remove temporary file");
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::records::offer_snapshot;

    fn store(directory: &Path) -> FileSnapshotStore {
        let config = StoreConfig {
            directory: directory.to_path_buf(),
            ..StoreConfig::default()
        };
        FileSnapshotStore::new(&config, Arc::new(TableSchema::job_offers()))
    }

    #[tokio::test]
    async fn missing_body_is_not_found() {
        let dir = tempfile::tempdir().unwrap();

        let err = store(dir.path()).read_last().await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::SnapshotNotFound);
    }

    #[tokio::test]
    async fn written_snapshot_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let snapshot = offer_snapshot(3);

        store.write(&snapshot).await.unwrap();
        let stored = store.read_last().await.unwrap();

        assert_eq!(stored.records(), snapshot.records());
        assert_eq!(stored.version(), snapshot.version());
        let status = store.read_status().await.unwrap().unwrap();
        assert_eq!(status.outcome, SyncOutcome::Ok);
        assert_eq!(status.record_count, 3);
    }

    #[tokio::test]
    async fn corrupted_metadata_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        std::fs::write(store.metadata_path(), b"{not json").unwrap();

        let err = store.read_status().await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::SnapshotCorrupted);
    }
}
