use std::path::PathBuf;

use secrecy::SecretString;
use serde::Deserialize;

use crate::shared::ValidationError;

fn default_region() -> String {
    SourceConfig::DEFAULT_REGION.to_string()
}

/// Configuration of the table that snapshots are taken from.
///
/// This intentionally does not implement [`serde::Serialize`] to avoid accidentally
/// leaking credentials into serialized forms.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceConfig {
    /// A DynamoDB table read with paginated `Scan` requests.
    #[serde(rename = "dynamodb")]
    DynamoDb {
        /// Name of the table.
        table_name: String,
        /// AWS region hosting the table.
        #[serde(default = "default_region")]
        region: String,
        /// Custom endpoint, e.g. DynamoDB Local.
        endpoint_url: Option<String>,
        /// Explicit access key id. When absent the default AWS credential chain is used.
        access_key_id: Option<String>,
        /// Explicit secret access key, required when `access_key_id` is set.
        secret_access_key: Option<SecretString>,
        /// Maximum number of items evaluated per page. `None` lets the service decide.
        page_size: Option<u32>,
        /// Whether scans use strongly consistent reads.
        #[serde(default)]
        consistent_read: bool,
    },
    /// A read-only JSON array of items, such as a backup produced before a purge.
    JsonFile {
        /// Path to the JSON file.
        path: PathBuf,
        /// Logical table name used for confirmations and backup file names.
        table_name: String,
        /// Number of items returned per page.
        page_size: Option<u32>,
    },
}

impl SourceConfig {
    /// Region used when none is configured, matching where the offers table lives.
    pub const DEFAULT_REGION: &'static str = "us-east-2";

    /// Returns the logical name of the source table.
    pub fn table_name(&self) -> &str {
        match self {
            SourceConfig::DynamoDb { table_name, .. } => table_name,
            SourceConfig::JsonFile { table_name, .. } => table_name,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.table_name().trim().is_empty() {
            return Err(ValidationError::InvalidFieldValue {
                field: "source.table_name".to_string(),
                constraint: "must not be empty".to_string(),
            });
        }

        let page_size = match self {
            SourceConfig::DynamoDb {
                access_key_id,
                secret_access_key,
                page_size,
                ..
            } => {
                if access_key_id.is_some() != secret_access_key.is_some() {
                    return Err(ValidationError::InvalidFieldValue {
                        field: "source.dynamodb.access_key_id".to_string(),
                        constraint: "must be set together with `secret_access_key`".to_string(),
                    });
                }
                page_size
            }
            SourceConfig::JsonFile { page_size, .. } => page_size,
        };

        if *page_size == Some(0) {
            return Err(ValidationError::InvalidFieldValue {
                field: "source.page_size".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}
