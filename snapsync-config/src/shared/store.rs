use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

fn default_directory() -> PathBuf {
    PathBuf::from(".")
}

fn default_snapshot_file() -> String {
    StoreConfig::DEFAULT_SNAPSHOT_FILE.to_string()
}

fn default_metadata_file() -> String {
    StoreConfig::DEFAULT_METADATA_FILE.to_string()
}

const fn default_write_bom() -> bool {
    true
}

fn default_popular_languages() -> Vec<String> {
    EnrichmentConfig::DEFAULT_POPULAR_LANGUAGES
        .iter()
        .map(|language| language.to_string())
        .collect()
}

/// Where and how snapshots and their status metadata are persisted.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StoreConfig {
    /// Directory holding the snapshot body, the metadata document and archived versions.
    #[serde(default = "default_directory")]
    pub directory: PathBuf,
    /// File name of the live snapshot body (CSV).
    #[serde(default = "default_snapshot_file")]
    pub snapshot_file: String,
    /// File name of the status metadata document (JSON).
    #[serde(default = "default_metadata_file")]
    pub metadata_file: String,
    /// Number of versioned copies of the snapshot body to keep next to the live file.
    ///
    /// Zero disables archiving.
    #[serde(default)]
    pub retain_versions: usize,
    /// Whether the CSV body starts with a UTF-8 byte order mark, which spreadsheet and BI
    /// tools use to detect the encoding.
    #[serde(default = "default_write_bom")]
    pub write_bom: bool,
    /// Derived columns appended to the exported snapshot.
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
}

impl StoreConfig {
    pub const DEFAULT_SNAPSHOT_FILE: &'static str = "ofertas_powerbi_live.csv";
    pub const DEFAULT_METADATA_FILE: &'static str = "powerbi_metadata.json";

    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, value) in [
            ("store.snapshot_file", &self.snapshot_file),
            ("store.metadata_file", &self.metadata_file),
        ] {
            if value.trim().is_empty() || value.contains(['/', '\\']) {
                return Err(ValidationError::InvalidFieldValue {
                    field: field.to_string(),
                    constraint: "must be a plain, non-empty file name".to_string(),
                });
            }
        }

        if self.snapshot_file == self.metadata_file {
            return Err(ValidationError::InvalidFieldValue {
                field: "store.metadata_file".to_string(),
                constraint: "must differ from `snapshot_file`".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            snapshot_file: default_snapshot_file(),
            metadata_file: default_metadata_file(),
            retain_versions: 0,
            write_bom: default_write_bom(),
            enrichment: EnrichmentConfig::default(),
        }
    }
}

/// Derived analysis columns added to the exported snapshot.
///
/// Derived columns are pure functions of the canonical record, so they never influence
/// change detection and are dropped when a snapshot is read back.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EnrichmentConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Languages that get a dedicated `Usa_<language>` flag column.
    #[serde(default = "default_popular_languages")]
    pub popular_languages: Vec<String>,
}

impl EnrichmentConfig {
    pub const DEFAULT_POPULAR_LANGUAGES: &'static [&'static str] =
        &["Python", "JavaScript", "Java", "C#", "React", "Angular"];
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            popular_languages: default_popular_languages(),
        }
    }
}
