//! Complete, paginated reads of a source table.

use std::fmt;
use std::pin::pin;

use futures::{Stream, StreamExt, TryStreamExt, stream};
use metrics::counter;
use tracing::{debug, error};

use crate::error::{ErrorKind, SyncError};
use crate::failpoints::{SCANNER__BEFORE_PAGE, sync_fail_point};
use crate::metrics::{
    ERROR_KIND_LABEL, SNAPSYNC_SCAN_FAILURES_TOTAL, SNAPSYNC_SCAN_PAGES_TOTAL, TABLE_NAME_LABEL,
};
use crate::source::{ScanPage, ScanRequest, SourceTable};
use crate::sync_error;
use crate::types::{ContinuationToken, RawRecord};

/// A page read failed and the scan stopped.
///
/// The scan can be resumed with [`TableScanner::resume_from`] using [`ScanFailure::resume_from`],
/// which is the token of the last page read successfully.
#[derive(Debug, Clone)]
pub struct ScanFailure {
    /// Token to continue from. [`None`] means the scan must restart from the beginning.
    pub resume_from: Option<ContinuationToken>,
    /// Pages read successfully before the failure.
    pub pages_read: usize,
    /// Error returned by the source.
    pub error: SyncError,
}

impl fmt::Display for ScanFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scan aborted after {} page(s)", self.pages_read)?;
        if let Some(token) = &self.resume_from {
            write!(f, ", resumable from {token}")?;
        }
        write!(f, ": {}", self.error.summary())
    }
}

impl From<ScanFailure> for SyncError {
    #[track_caller]
    fn from(failure: ScanFailure) -> SyncError {
        let detail = failure.to_string();
        sync_error!(
            ErrorKind::ScanFailure,
            "Table scan aborted",
            detail = detail,
            source: failure.error
        )
    }
}

#[derive(Debug)]
struct Cursor {
    next: Option<ContinuationToken>,
    pages_read: usize,
    done: bool,
}

/// Reads every item of a [`SourceTable`] by following continuation tokens.
///
/// Scans are lazy and restartable: each call to [`TableScanner::pages`] or
/// [`TableScanner::scan`] starts a new enumeration. Scanning never modifies the table.
#[derive(Debug, Clone)]
pub struct TableScanner<'a, S> {
    source: &'a S,
    projection: Option<Vec<String>>,
    page_size: Option<u32>,
    start: Option<ContinuationToken>,
}

impl<'a, S> TableScanner<'a, S>
where
    S: SourceTable + Sync,
{
    pub fn new(source: &'a S) -> Self {
        Self {
            source,
            projection: None,
            page_size: None,
            start: None,
        }
    }

    /// Returns only the named attributes of each item.
    pub fn with_projection(mut self, attributes: Vec<String>) -> Self {
        self.projection = Some(attributes);
        self
    }

    /// Limits the number of items evaluated per page.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Starts enumeration after `token` instead of at the beginning of the table.
    pub fn resume_from(mut self, token: ContinuationToken) -> Self {
        self.start = Some(token);
        self
    }

    /// Streams pages until the source stops returning a continuation token.
    ///
    /// The first failing page ends the stream with a [`ScanFailure`].
    pub fn pages(&self) -> impl Stream<Item = Result<ScanPage, ScanFailure>> + Send + '_ {
        let cursor = Cursor {
            next: self.start.clone(),
            pages_read: 0,
            done: false,
        };

        stream::unfold(cursor, move |mut cursor| async move {
            if cursor.done {
                return None;
            }

            let request = ScanRequest {
                start: cursor.next.clone(),
                projection: self.projection.clone(),
                limit: self.page_size,
            };

            match self.read_page(request).await {
                Ok(page) => {
                    cursor.pages_read += 1;
                    counter!(
                        SNAPSYNC_SCAN_PAGES_TOTAL,
                        TABLE_NAME_LABEL => self.source.name().to_string()
                    )
                    .increment(1);
                    debug!(
                        table = self.source.name(),
                        page = cursor.pages_read,
                        records = page.records.len(),
                        has_next = page.next.is_some(),
                        "read page"
                    );

                    cursor.done = page.next.is_none();
                    cursor.next = page.next.clone();
                    Some((Ok(page), cursor))
                }
                Err(err) => {
                    counter!(
                        SNAPSYNC_SCAN_FAILURES_TOTAL,
                        TABLE_NAME_LABEL => self.source.name().to_string(),
                        ERROR_KIND_LABEL => format!("{:?}", err.kind())
                    )
                    .increment(1);
                    error!(
                        table = self.source.name(),
                        pages_read = cursor.pages_read,
                        resume_from = ?cursor.next.as_ref().map(ToString::to_string),
                        error = %err.summary(),
                        "page read failed, aborting scan"
                    );

                    cursor.done = true;
                    let failure = ScanFailure {
                        resume_from: cursor.next.clone(),
                        pages_read: cursor.pages_read,
                        error: err,
                    };
                    Some((Err(failure), cursor))
                }
            }
        })
    }

    /// Streams every item of the table.
    pub fn scan(&self) -> impl Stream<Item = Result<RawRecord, ScanFailure>> + Send + '_ {
        self.pages()
            .map_ok(|page| stream::iter(page.records.into_iter().map(Ok)))
            .try_flatten()
    }

    /// Reads every item of the table into memory.
    pub async fn collect(&self) -> Result<Vec<RawRecord>, ScanFailure> {
        self.scan().try_collect().await
    }

    /// Counts the items of the table with the same pagination as [`TableScanner::scan`].
    pub async fn count(&self) -> Result<usize, ScanFailure> {
        let mut pages = pin!(self.pages());

        let mut count = 0;
        while let Some(page) = pages.next().await {
            count += page?.records.len();
        }

        Ok(count)
    }

    async fn read_page(&self, request: ScanRequest) -> Result<ScanPage, SyncError> {
        sync_fail_point(SCANNER__BEFORE_PAGE, ErrorKind::SourceQueryFailed)?;

        let requested = request.start.clone();
        let page = self.source.scan_page(request).await?;

        if let Some(next) = &page.next
            && requested.as_ref() == Some(next)
        {
            return Err(sync_error!(
                ErrorKind::InvalidState,
                "Source returned a non-advancing continuation token",
                format!("token {next}")
            ));
        }

        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::memory::MemorySourceTable;
    use crate::test_utils::records::offer;
    use crate::test_utils::source::FaultySourceTable;

    async fn table(count: usize) -> MemorySourceTable {
        let table = MemorySourceTable::new("ofertas_trabajo", vec!["ID_Oferta".to_string()]);
        table
            .insert((0..count).map(|i| offer(&format!("of-{i:03}"))))
            .await
            .unwrap();
        table
    }

    #[tokio::test]
    async fn scan_yields_every_record_once() {
        let table = table(57).await;
        let scanner = TableScanner::new(&table).with_page_size(10);

        let records = scanner.collect().await.unwrap();

        assert_eq!(records.len(), 57);
        let mut ids: Vec<_> = records.iter().map(|r| r["ID_Oferta"].clone()).collect();
        ids.dedup();
        assert_eq!(ids.len(), 57);
    }

    #[tokio::test]
    async fn scan_is_restartable() {
        let table = table(5).await;
        let scanner = TableScanner::new(&table).with_page_size(2);

        assert_eq!(scanner.count().await.unwrap(), 5);
        assert_eq!(scanner.count().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn empty_table_yields_one_empty_page() {
        let table = table(0).await;
        let scanner = TableScanner::new(&table);

        let pages: Vec<_> = scanner.pages().collect().await;

        assert_eq!(pages.len(), 1);
        assert!(pages[0].as_ref().unwrap().records.is_empty());
    }

    #[tokio::test]
    async fn failure_carries_last_successful_token() {
        let table = table(30).await;
        let faulty = FaultySourceTable::new(table.clone()).fail_scan_page(2);
        let scanner = TableScanner::new(&faulty).with_page_size(10);

        let failure = scanner.collect().await.unwrap_err();
        assert_eq!(failure.pages_read, 2);
        let token = failure.resume_from.clone().unwrap();

        let resumed = TableScanner::new(&table)
            .with_page_size(10)
            .resume_from(token)
            .collect()
            .await
            .unwrap();
        assert_eq!(resumed.len(), 10);

        let error = SyncError::from(failure);
        assert_eq!(error.kind(), ErrorKind::ScanFailure);
    }

    #[tokio::test]
    async fn projection_returns_keys_only() {
        let table = table(3).await;
        let scanner = TableScanner::new(&table).with_projection(vec!["ID_Oferta".to_string()]);

        let records = scanner.collect().await.unwrap();

        assert!(records.iter().all(|record| record.len() == 1));
    }
}
