use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::bail;
use crate::error::{ErrorKind, SyncResult};
use crate::source::{BatchDeleteOutcome, ScanPage, ScanRequest, SourceTable};
use crate::types::{ContinuationToken, PrimaryKey, RawRecord};

/// Number of items returned per page when the request sets no limit.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Reads one page from items ordered by key.
///
/// Pages continue strictly after the key carried by the request token, so items deleted
/// or added between pages never shift the cursor.
pub(crate) fn page_from(
    items: &BTreeMap<PrimaryKey, RawRecord>,
    request: &ScanRequest,
) -> ScanPage {
    let limit = request.limit.unwrap_or(DEFAULT_PAGE_SIZE).max(1) as usize;

    let lower = match &request.start {
        Some(token) => Bound::Excluded(token.last_evaluated_key().clone()),
        None => Bound::Unbounded,
    };
    let mut range = items.range((lower, Bound::Unbounded));

    let mut records = Vec::with_capacity(limit);
    let mut last_key = None;
    for (key, record) in range.by_ref().take(limit) {
        records.push(project(record, request.projection.as_deref()));
        last_key = Some(key.clone());
    }

    let next = match (last_key, range.next()) {
        (Some(last_key), Some(_)) => Some(ContinuationToken::new(last_key)),
        _ => None,
    };

    ScanPage { records, next }
}

/// Keeps only the projected attributes of `record`.
pub(crate) fn project(record: &RawRecord, projection: Option<&[String]>) -> RawRecord {
    match projection {
        Some(names) => record
            .iter()
            .filter(|(name, _)| names.contains(name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect(),
        None => record.clone(),
    }
}

/// Indexes `records` by their key attributes.
pub(crate) fn index_records(
    key_attributes: &[String],
    records: impl IntoIterator<Item = RawRecord>,
) -> SyncResult<BTreeMap<PrimaryKey, RawRecord>> {
    let mut items = BTreeMap::new();
    for record in records {
        let Some(key) = PrimaryKey::from_record(&record, key_attributes) else {
            bail!(
                ErrorKind::InvalidData,
                "Item is missing key attributes",
                format!("expected attributes {key_attributes:?}")
            );
        };
        items.insert(key, record);
    }

    Ok(items)
}

#[derive(Debug)]
struct Inner {
    items: BTreeMap<PrimaryKey, RawRecord>,
}

/// In-memory table for tests and development.
///
/// Items are ordered by primary key, the way a hash-partitioned table returns them in a
/// stable order. Clones share the same items.
#[derive(Debug, Clone)]
pub struct MemorySourceTable {
    name: Arc<str>,
    key_attributes: Arc<[String]>,
    inner: Arc<Mutex<Inner>>,
}

impl MemorySourceTable {
    /// Creates an empty table keyed by `key_attributes`.
    pub fn new(name: impl Into<String>, key_attributes: Vec<String>) -> Self {
        Self {
            name: Arc::from(name.into()),
            key_attributes: Arc::from(key_attributes),
            inner: Arc::new(Mutex::new(Inner {
                items: BTreeMap::new(),
            })),
        }
    }

    /// Inserts or replaces items.
    pub async fn insert(&self, records: impl IntoIterator<Item = RawRecord>) -> SyncResult<()> {
        let indexed = index_records(&self.key_attributes, records)?;

        let mut inner = self.inner.lock().await;
        inner.items.extend(indexed);

        Ok(())
    }

    /// Returns a copy of every item, in key order.
    pub async fn records(&self) -> Vec<RawRecord> {
        let inner = self.inner.lock().await;
        inner.items.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        let inner = self.inner.lock().await;
        inner.items.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Removes every item.
    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        inner.items.clear();
    }
}

impl SourceTable for MemorySourceTable {
    fn name(&self) -> &str {
        &self.name
    }

    async fn scan_page(&self, request: ScanRequest) -> SyncResult<ScanPage> {
        let inner = self.inner.lock().await;
        Ok(page_from(&inner.items, &request))
    }

    async fn delete_batch(&self, keys: Vec<PrimaryKey>) -> SyncResult<BatchDeleteOutcome> {
        let mut inner = self.inner.lock().await;

        let mut deleted = 0;
        for key in &keys {
            if inner.items.remove(key).is_some() {
                deleted += 1;
            }
        }

        debug!(
            table = %self.name,
            requested = keys.len(),
            deleted,
            "deleted batch from memory table"
        );

        Ok(BatchDeleteOutcome::default())
    }
}
