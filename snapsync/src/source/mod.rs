mod base;
#[cfg(feature = "dynamodb")]
pub mod dynamodb;
pub mod json_file;
pub mod memory;

pub use base::*;

use snapsync_config::shared::SourceConfig;

#[cfg(not(feature = "dynamodb"))]
use crate::bail;
#[cfg(not(feature = "dynamodb"))]
use crate::error::ErrorKind;
use crate::error::SyncResult;
use crate::types::PrimaryKey;

/// Source table selected by configuration.
#[derive(Debug, Clone)]
pub enum AnySourceTable {
    JsonFile(json_file::JsonFileSourceTable),
    #[cfg(feature = "dynamodb")]
    DynamoDb(dynamodb::DynamoDbSourceTable),
}

impl AnySourceTable {
    /// Opens the table described by `config`, whose items are keyed by `key_attributes`.
    pub async fn from_config(config: &SourceConfig, key_attributes: &[String]) -> SyncResult<Self> {
        match config {
            SourceConfig::JsonFile {
                path,
                table_name,
                page_size,
            } => {
                let table = json_file::JsonFileSourceTable::open(
                    table_name.clone(),
                    path,
                    key_attributes,
                    *page_size,
                )
                .await?;
                Ok(AnySourceTable::JsonFile(table))
            }
            #[cfg(feature = "dynamodb")]
            SourceConfig::DynamoDb {
                table_name,
                region,
                endpoint_url,
                access_key_id,
                secret_access_key,
                page_size,
                consistent_read,
            } => {
                let settings = dynamodb::DynamoDbSettings {
                    table_name: table_name.clone(),
                    region: region.clone(),
                    endpoint_url: endpoint_url.clone(),
                    access_key_id: access_key_id.clone(),
                    secret_access_key: secret_access_key.clone(),
                    page_size: *page_size,
                    consistent_read: *consistent_read,
                };
                Ok(AnySourceTable::DynamoDb(
                    dynamodb::DynamoDbSourceTable::connect(settings).await,
                ))
            }
            #[cfg(not(feature = "dynamodb"))]
            SourceConfig::DynamoDb { table_name, .. } => {
                bail!(
                    ErrorKind::ConfigError,
                    "DynamoDB support is not enabled in this build",
                    format!("table `{table_name}` requires the `dynamodb` feature")
                )
            }
        }
    }
}

impl SourceTable for AnySourceTable {
    fn name(&self) -> &str {
        match self {
            AnySourceTable::JsonFile(table) => table.name(),
            #[cfg(feature = "dynamodb")]
            AnySourceTable::DynamoDb(table) => table.name(),
        }
    }

    async fn scan_page(&self, request: ScanRequest) -> SyncResult<ScanPage> {
        match self {
            AnySourceTable::JsonFile(table) => table.scan_page(request).await,
            #[cfg(feature = "dynamodb")]
            AnySourceTable::DynamoDb(table) => table.scan_page(request).await,
        }
    }

    async fn delete_batch(&self, keys: Vec<PrimaryKey>) -> SyncResult<BatchDeleteOutcome> {
        match self {
            AnySourceTable::JsonFile(table) => table.delete_batch(keys).await,
            #[cfg(feature = "dynamodb")]
            AnySourceTable::DynamoDb(table) => table.delete_batch(keys).await,
        }
    }
}
