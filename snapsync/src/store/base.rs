use std::future::Future;

use crate::error::SyncResult;
use crate::types::{Snapshot, SyncStatus};

/// Trait for persisting published snapshots and the status of the latest sync cycle.
///
/// A store holds at most one live snapshot (the body) and one status record (the metadata).
/// The body is always written completely before the metadata is updated, so the metadata
/// never describes a partially written body.
pub trait SnapshotStore {
    /// Returns the last published snapshot.
    ///
    /// Fails with [`crate::error::ErrorKind::SnapshotNotFound`] when nothing was published yet.
    fn read_last(&self) -> impl Future<Output = SyncResult<Snapshot>> + Send;

    /// Publishes `snapshot` and records an `OK` status describing it.
    ///
    /// When this fails, the previously published snapshot is still readable.
    fn write(&self, snapshot: &Snapshot) -> impl Future<Output = SyncResult<()>> + Send;

    /// Records `status` without touching the published snapshot.
    fn write_status(&self, status: &SyncStatus) -> impl Future<Output = SyncResult<()>> + Send;

    /// Returns the status of the latest cycle, if any was recorded.
    fn read_status(&self) -> impl Future<Output = SyncResult<Option<SyncStatus>>> + Send;
}
