use std::future::Future;

use crate::error::SyncResult;
use crate::types::{ContinuationToken, PrimaryKey, RawRecord};

/// Parameters of a single page read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanRequest {
    /// Where to continue from. [`None`] starts at the beginning of the table.
    pub start: Option<ContinuationToken>,
    /// Attributes to return. [`None`] returns whole items.
    pub projection: Option<Vec<String>>,
    /// Maximum number of items to evaluate. [`None`] lets the source decide.
    pub limit: Option<u32>,
}

/// Result of a single page read.
#[derive(Debug, Clone, Default)]
pub struct ScanPage {
    pub records: Vec<RawRecord>,
    /// Present when more items remain.
    pub next: Option<ContinuationToken>,
}

/// Result of a batch delete accepted by the source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchDeleteOutcome {
    /// Keys the source accepted but did not delete.
    pub unprocessed: Vec<PrimaryKey>,
}

/// A key-value table that can be scanned page by page and deleted from in batches.
///
/// Implementations only perform single requests; pagination, batching and failure
/// isolation live in [`crate::scan::TableScanner`] and [`crate::delete::BatchDeleter`].
pub trait SourceTable {
    /// Returns the name of the table.
    fn name(&self) -> &str;

    /// Reads one page of items.
    ///
    /// A page may be empty while still carrying a continuation token.
    fn scan_page(&self, request: ScanRequest) -> impl Future<Output = SyncResult<ScanPage>> + Send;

    /// Deletes the items identified by `keys` in a single request.
    ///
    /// An error means the whole batch was rejected. Keys listed in the outcome were not
    /// deleted even though the request succeeded.
    fn delete_batch(
        &self,
        keys: Vec<PrimaryKey>,
    ) -> impl Future<Output = SyncResult<BatchDeleteOutcome>> + Send;
}
