use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use crate::bail;
use crate::error::{ErrorKind, SyncResult};
use crate::source::memory::{index_records, page_from};
use crate::source::{BatchDeleteOutcome, ScanPage, ScanRequest, SourceTable};
use crate::types::{PrimaryKey, RawRecord, RawValue};

/// Read-only table backed by a JSON array of items, such as a backup taken before a purge.
#[derive(Debug, Clone)]
pub struct JsonFileSourceTable {
    name: String,
    path: PathBuf,
    page_size: Option<u32>,
    items: Arc<BTreeMap<PrimaryKey, RawRecord>>,
}

impl JsonFileSourceTable {
    /// Loads every item of the file at `path`.
    pub async fn open(
        name: impl Into<String>,
        path: impl AsRef<Path>,
        key_attributes: &[String],
        page_size: Option<u32>,
    ) -> SyncResult<Self> {
        let name = name.into();
        let path = path.as_ref().to_path_buf();

        let contents = tokio::fs::read(&path).await?;
        let document: serde_json::Value = serde_json::from_slice(&contents)?;

        let serde_json::Value::Array(values) = document else {
            bail!(
                ErrorKind::InvalidData,
                "JSON source must be an array of items",
                format!("file `{}`", path.display())
            );
        };

        let mut records = Vec::with_capacity(values.len());
        for value in values {
            match RawValue::from(value) {
                RawValue::Map(record) => records.push(record),
                other => bail!(
                    ErrorKind::InvalidData,
                    "JSON source item is not an object",
                    format!("file `{}`, item {other}", path.display())
                ),
            }
        }

        let items = index_records(key_attributes, records)?;
        info!(
            table = %name,
            path = %path.display(),
            items = items.len(),
            "loaded json source table"
        );

        Ok(Self {
            name,
            path,
            page_size,
            items: Arc::new(items),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SourceTable for JsonFileSourceTable {
    fn name(&self) -> &str {
        &self.name
    }

    async fn scan_page(&self, mut request: ScanRequest) -> SyncResult<ScanPage> {
        if request.limit.is_none() {
            request.limit = self.page_size;
        }

        Ok(page_from(&self.items, &request))
    }

    async fn delete_batch(&self, _keys: Vec<PrimaryKey>) -> SyncResult<BatchDeleteOutcome> {
        bail!(
            ErrorKind::SourceReadOnly,
            "JSON file sources are read-only",
            format!("file `{}`", self.path.display())
        );
    }
}
