use std::path::PathBuf;

use serde::{Deserialize, Serialize};

fn default_backup_directory() -> PathBuf {
    PathBuf::from(".")
}

/// Settings for bulk deletion runs.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DeleteConfig {
    /// Directory where backups taken before a purge are written.
    #[serde(default = "default_backup_directory")]
    pub backup_directory: PathBuf,
}

impl Default for DeleteConfig {
    fn default() -> Self {
        Self {
            backup_directory: default_backup_directory(),
        }
    }
}
