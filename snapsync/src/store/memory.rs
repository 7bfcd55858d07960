use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::{ErrorKind, SyncResult};
use crate::store::base::SnapshotStore;
use crate::sync_error;
use crate::types::{Snapshot, SyncStatus};

/// Inner state of [`MemorySnapshotStore`].
#[derive(Debug, Default)]
struct Inner {
    snapshot: Option<Snapshot>,
    status: Option<SyncStatus>,
    /// Every status recorded, oldest first.
    status_history: Vec<SyncStatus>,
    /// Number of snapshots published.
    body_writes: usize,
}

/// In-memory [`SnapshotStore`], used by tests and dry runs.
///
/// Keeps the full status history so callers can assert on the sequence of cycle outcomes.
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshotStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every status recorded so far, oldest first.
    pub async fn status_history(&self) -> Vec<SyncStatus> {
        let inner = self.inner.lock().await;
        inner.status_history.clone()
    }

    /// Number of times a snapshot body was published.
    pub async fn body_writes(&self) -> usize {
        let inner = self.inner.lock().await;
        inner.body_writes
    }
}

impl SnapshotStore for MemorySnapshotStore {
    async fn read_last(&self) -> SyncResult<Snapshot> {
        let inner = self.inner.lock().await;

        inner.snapshot.clone().ok_or_else(|| {
            sync_error!(
                ErrorKind::SnapshotNotFound,
                "No snapshot has been published"
            )
        })
    }

    async fn write(&self, snapshot: &Snapshot) -> SyncResult<()> {
        let status = SyncStatus::published(snapshot);

        let mut inner = self.inner.lock().await;
        inner.snapshot = Some(snapshot.clone());
        inner.body_writes += 1;
        inner.status = Some(status.clone());
        inner.status_history.push(status);

        Ok(())
    }

    async fn write_status(&self, status: &SyncStatus) -> SyncResult<()> {
        let mut inner = self.inner.lock().await;
        inner.status = Some(status.clone());
        inner.status_history.push(status.clone());

        Ok(())
    }

    async fn read_status(&self) -> SyncResult<Option<SyncStatus>> {
        let inner = self.inner.lock().await;

        Ok(inner.status.clone())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDateTime;

    use super::*;
    use crate::schema::TableSchema;
    use crate::types::SyncOutcome;

    #[tokio::test]
    async fn empty_store_has_no_snapshot() {
        let store = MemorySnapshotStore::new();

        let err = store.read_last().await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::SnapshotNotFound);
        assert!(store.read_status().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn status_writes_keep_the_body() {
        let store = MemorySnapshotStore::new();
        let snapshot = Snapshot::new(
            Arc::new(TableSchema::job_offers()),
            Vec::new(),
            NaiveDateTime::default(),
        );
        store.write(&snapshot).await.unwrap();

        let stored = store.read_last().await.unwrap();
        store
            .write_status(&SyncStatus::unchanged(NaiveDateTime::default(), &stored))
            .await
            .unwrap();

        assert_eq!(store.body_writes().await, 1);
        let outcomes: Vec<_> = store
            .status_history()
            .await
            .into_iter()
            .map(|status| status.outcome)
            .collect();
        assert_eq!(outcomes, vec![SyncOutcome::Ok, SyncOutcome::NoChange]);
    }
}
