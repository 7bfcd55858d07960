//! Bulk deletion of source table items in fixed-size batches.
//!
//! Batches are submitted one after the other. A rejected batch is recorded in the
//! [`DeletionReport`] and the run continues with the next batch; nothing is retried here.
//! Callers retry by feeding [`DeletionReport::residual_keys`] to a new run.

use metrics::counter;
use tracing::{error, info, warn};

use crate::error::{ErrorKind, SyncError, SyncResult};
use crate::failpoints::{DELETER__BEFORE_BATCH, sync_fail_point};
use crate::metrics::{
    SNAPSYNC_DELETE_FAILED_KEYS_TOTAL, SNAPSYNC_DELETED_KEYS_TOTAL, TABLE_NAME_LABEL,
};
use crate::scan::TableScanner;
use crate::source::SourceTable;
use crate::types::PrimaryKey;
use crate::{bail, sync_error};

/// Maximum number of keys submitted in one batch.
pub const BATCH_SIZE: usize = 25;

/// Number of deletions between two progress log lines.
pub const PROGRESS_INTERVAL: usize = 100;

/// Authorization for a destructive run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteConfirmation {
    /// Deletes for real. The token must equal the name of the table.
    Confirmed(String),
    /// Plans the run without deleting anything.
    DryRun,
}

impl DeleteConfirmation {
    pub fn is_dry_run(&self) -> bool {
        matches!(self, DeleteConfirmation::DryRun)
    }

    /// Fails unless this confirmation authorizes deleting from `table_name`.
    pub fn authorize(&self, table_name: &str) -> SyncResult<()> {
        if let DeleteConfirmation::Confirmed(token) = self
            && token != table_name
        {
            bail!(
                ErrorKind::ConfirmationMismatch,
                "Deletion was not confirmed for this table",
                format!("confirmation `{token}` does not match table `{table_name}`")
            );
        }

        Ok(())
    }
}

/// A batch rejected as a whole.
#[derive(Debug, Clone)]
pub struct FailedBatch {
    /// Position of the batch in the run, starting at 0.
    pub index: usize,
    pub keys: Vec<PrimaryKey>,
    pub error: SyncError,
}

/// Outcome of a deletion run.
#[derive(Debug, Clone, Default)]
pub struct DeletionReport {
    /// Keys handed to the run.
    pub planned: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub failed_batches: Vec<FailedBatch>,
    /// Keys of accepted batches that the source left undeleted.
    pub unprocessed: Vec<PrimaryKey>,
    pub dry_run: bool,
}

impl DeletionReport {
    fn planned(planned: usize, dry_run: bool) -> Self {
        Self {
            planned,
            dry_run,
            ..Self::default()
        }
    }

    /// Keys that still exist after the run and can be submitted again.
    pub fn residual_keys(&self) -> Vec<PrimaryKey> {
        self.failed_batches
            .iter()
            .flat_map(|batch| batch.keys.iter().cloned())
            .chain(self.unprocessed.iter().cloned())
            .collect()
    }

    /// Percentage of attempted keys that were deleted, 100 when nothing was attempted.
    pub fn success_rate(&self) -> f64 {
        let attempted = self.succeeded + self.failed;
        if attempted == 0 {
            return 100.0;
        }

        self.succeeded as f64 * 100.0 / attempted as f64
    }

    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }
}

/// Outcome of emptying a whole table.
#[derive(Debug, Clone)]
pub struct PurgeReport {
    /// Items in the table before the run.
    pub before: usize,
    /// Items left after the run, [`None`] when the final count failed.
    pub after: Option<usize>,
    pub deletion: DeletionReport,
}

/// Deletes items of a [`SourceTable`] in batches of [`BATCH_SIZE`].
#[derive(Debug, Clone)]
pub struct BatchDeleter<S> {
    source: S,
    key_attributes: Vec<String>,
}

impl<S> BatchDeleter<S>
where
    S: SourceTable + Sync,
{
    /// Creates a deleter for a table whose items are identified by `key_attributes`.
    pub fn new(source: S, key_attributes: Vec<String>) -> Self {
        Self {
            source,
            key_attributes,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Deletes every key, isolating failures per batch.
    ///
    /// Only a confirmation mismatch fails the call; batch failures are reported.
    pub async fn delete_all(
        &self,
        keys: Vec<PrimaryKey>,
        confirmation: &DeleteConfirmation,
    ) -> SyncResult<DeletionReport> {
        let table_name = self.source.name();
        confirmation.authorize(table_name)?;

        let batches = keys.len().div_ceil(BATCH_SIZE);
        let mut report = DeletionReport::planned(keys.len(), confirmation.is_dry_run());

        if confirmation.is_dry_run() {
            info!(
                table = table_name,
                keys = keys.len(),
                batches,
                "dry run, nothing deleted"
            );
            return Ok(report);
        }

        info!(table = table_name, keys = keys.len(), batches, "deleting keys");

        for (index, batch) in keys.chunks(BATCH_SIZE).enumerate() {
            let deleted_before = report.succeeded;

            match self.delete_batch(batch).await {
                Ok(unprocessed) => {
                    report.succeeded += batch.len() - unprocessed.len();
                    report.failed += unprocessed.len();

                    if !unprocessed.is_empty() {
                        warn!(
                            table = table_name,
                            batch = index,
                            unprocessed = unprocessed.len(),
                            "batch partially processed"
                        );
                    }
                    report.unprocessed.extend(unprocessed);
                }
                Err(err) => {
                    error!(
                        table = table_name,
                        batch = index,
                        keys = batch.len(),
                        error = %err.summary(),
                        "batch delete failed, continuing with next batch"
                    );

                    report.failed += batch.len();
                    report.failed_batches.push(FailedBatch {
                        index,
                        keys: batch.to_vec(),
                        error: err,
                    });
                }
            }

            let deleted = report.succeeded - deleted_before;
            counter!(SNAPSYNC_DELETED_KEYS_TOTAL, TABLE_NAME_LABEL => table_name.to_string())
                .increment(deleted as u64);
            counter!(
                SNAPSYNC_DELETE_FAILED_KEYS_TOTAL,
                TABLE_NAME_LABEL => table_name.to_string()
            )
            .increment((batch.len() - deleted) as u64);

            if report.succeeded / PROGRESS_INTERVAL > deleted_before / PROGRESS_INTERVAL {
                info!(
                    table = table_name,
                    deleted = report.succeeded,
                    total = report.planned,
                    "deletion progress"
                );
            }
        }

        info!(
            table = table_name,
            succeeded = report.succeeded,
            failed = report.failed,
            failed_batches = report.failed_batches.len(),
            success_rate = format!("{:.1}", report.success_rate()),
            "deletion finished"
        );

        Ok(report)
    }

    /// Deletes every item of the table, counting items before and after.
    pub async fn purge(&self, confirmation: &DeleteConfirmation) -> SyncResult<PurgeReport> {
        confirmation.authorize(self.source.name())?;

        let keys = self.collect_keys().await?;
        let before = keys.len();

        let deletion = self.delete_all(keys, confirmation).await?;

        let after = if deletion.dry_run {
            Some(before)
        } else {
            match TableScanner::new(&self.source)
                .with_projection(self.key_attributes.clone())
                .count()
                .await
            {
                Ok(after) => Some(after),
                Err(failure) => {
                    warn!(error = %failure, "failed to count remaining items");
                    None
                }
            }
        };

        Ok(PurgeReport {
            before,
            after,
            deletion,
        })
    }

    /// Enumerates the primary keys of every item.
    pub async fn collect_keys(&self) -> SyncResult<Vec<PrimaryKey>> {
        let records = TableScanner::new(&self.source)
            .with_projection(self.key_attributes.clone())
            .collect()
            .await?;

        records
            .iter()
            .map(|record| {
                PrimaryKey::from_record(record, &self.key_attributes).ok_or_else(|| {
                    sync_error!(
                        ErrorKind::InvalidData,
                        "Item is missing a key attribute",
                        format!("expected attributes {:?}", self.key_attributes)
                    )
                })
            })
            .collect()
    }

    /// Submits one batch, returning the keys of the batch left unprocessed.
    ///
    /// Unprocessed keys the source reports outside of `batch` are ignored.
    async fn delete_batch(&self, batch: &[PrimaryKey]) -> SyncResult<Vec<PrimaryKey>> {
        let attempt = async {
            sync_fail_point(DELETER__BEFORE_BATCH, ErrorKind::BatchDeleteFailure)?;
            self.source.delete_batch(batch.to_vec()).await
        };

        match attempt.await {
            Ok(outcome) => {
                let unprocessed: Vec<PrimaryKey> = batch
                    .iter()
                    .filter(|key| outcome.unprocessed.contains(key))
                    .cloned()
                    .collect();

                if outcome.unprocessed.len() > unprocessed.len() {
                    warn!(
                        table = self.source.name(),
                        reported = outcome.unprocessed.len(),
                        in_batch = unprocessed.len(),
                        "source reported unprocessed keys outside of the batch"
                    );
                }

                Ok(unprocessed)
            }
            Err(err) if err.kind() == ErrorKind::BatchDeleteFailure => Err(err),
            Err(err) => {
                let detail = err.summary();
                Err(sync_error!(
                    ErrorKind::BatchDeleteFailure,
                    "Batch delete was rejected",
                    detail = detail,
                    source: err
                ))
            }
        }
    }
}
