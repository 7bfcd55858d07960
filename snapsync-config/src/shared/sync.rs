use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

const fn default_interval_mins() -> u64 {
    SyncConfig::DEFAULT_INTERVAL_MINS
}

/// Behavior of sync cycles.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SyncConfig {
    /// Minutes between two cycles when running on an interval.
    #[serde(default = "default_interval_mins")]
    pub interval_mins: u64,
    /// Whether an empty source table may replace the published snapshot.
    ///
    /// When `false`, a scan returning no records fails the cycle and the last published
    /// snapshot is kept.
    #[serde(default)]
    pub allow_empty_snapshot: bool,
}

impl SyncConfig {
    pub const DEFAULT_INTERVAL_MINS: u64 = 30;

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.interval_mins == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "sync.interval_mins".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_mins: default_interval_mins(),
            allow_empty_snapshot: false,
        }
    }
}
