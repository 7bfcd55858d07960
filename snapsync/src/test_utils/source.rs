use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::bail;
use crate::error::{ErrorKind, SyncResult};
use crate::source::memory::MemorySourceTable;
use crate::source::{BatchDeleteOutcome, ScanPage, ScanRequest, SourceTable};
use crate::types::PrimaryKey;

/// Faults injected by [`FaultySourceTable`]. Call indices start at 0.
#[derive(Debug, Default)]
struct Faults {
    failing_scan_calls: HashSet<usize>,
    failing_delete_calls: HashSet<usize>,
    unprocessed_per_batch: usize,
}

#[derive(Debug, Default)]
struct Calls {
    scan_pages: usize,
    delete_batch_sizes: Vec<usize>,
}

/// Wraps a [`SourceTable`] and fails selected requests.
///
/// Clones share their faults and call counters.
#[derive(Debug, Clone)]
pub struct FaultySourceTable<S = MemorySourceTable> {
    inner: S,
    faults: Arc<Mutex<Faults>>,
    calls: Arc<Mutex<Calls>>,
}

impl<S> FaultySourceTable<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            faults: Arc::new(Mutex::new(Faults::default())),
            calls: Arc::new(Mutex::new(Calls::default())),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Fails the `call`-th page read.
    pub fn fail_scan_page(self, call: usize) -> Self {
        self.faults
            .try_lock()
            .expect("faults are configured before use")
            .failing_scan_calls
            .insert(call);
        self
    }

    /// Rejects the `call`-th batch delete.
    pub fn fail_delete_batch(self, call: usize) -> Self {
        self.faults
            .try_lock()
            .expect("faults are configured before use")
            .failing_delete_calls
            .insert(call);
        self
    }

    /// Leaves the last `count` keys of every batch undeleted and reports them unprocessed.
    pub fn leave_unprocessed(self, count: usize) -> Self {
        self.faults
            .try_lock()
            .expect("faults are configured before use")
            .unprocessed_per_batch = count;
        self
    }

    /// Fails every page read from now on.
    pub async fn fail_all_scans(&self) {
        let calls = self.calls.lock().await.scan_pages;
        let mut faults = self.faults.lock().await;
        faults.failing_scan_calls.extend(calls..calls + 1_000);
    }

    /// Removes every configured fault.
    pub async fn heal(&self) {
        *self.faults.lock().await = Faults::default();
    }

    pub async fn scan_page_calls(&self) -> usize {
        self.calls.lock().await.scan_pages
    }

    /// Size of every batch submitted, in order.
    pub async fn delete_batch_sizes(&self) -> Vec<usize> {
        self.calls.lock().await.delete_batch_sizes.clone()
    }
}

impl<S> SourceTable for FaultySourceTable<S>
where
    S: SourceTable + Send + Sync,
{
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn scan_page(&self, request: ScanRequest) -> SyncResult<ScanPage> {
        let call = {
            let mut calls = self.calls.lock().await;
            calls.scan_pages += 1;
            calls.scan_pages - 1
        };

        if self.faults.lock().await.failing_scan_calls.contains(&call) {
            bail!(
                ErrorKind::SourceQueryFailed,
                "Scan request failed",
                format!("injected failure on page read {call}")
            );
        }

        self.inner.scan_page(request).await
    }

    async fn delete_batch(&self, mut keys: Vec<PrimaryKey>) -> SyncResult<BatchDeleteOutcome> {
        let call = {
            let mut calls = self.calls.lock().await;
            calls.delete_batch_sizes.push(keys.len());
            calls.delete_batch_sizes.len() - 1
        };

        let unprocessed_per_batch = {
            let faults = self.faults.lock().await;
            if faults.failing_delete_calls.contains(&call) {
                bail!(
                    ErrorKind::SourceQueryFailed,
                    "Batch write request failed",
                    format!("injected failure on batch {call}")
                );
            }
            faults.unprocessed_per_batch
        };

        let unprocessed = keys.split_off(keys.len().saturating_sub(unprocessed_per_batch));
        let mut outcome = self.inner.delete_batch(keys).await?;
        outcome.unprocessed.extend(unprocessed);

        Ok(outcome)
    }
}
