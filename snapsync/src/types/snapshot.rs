use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::bail;
use crate::error::{ErrorKind, SyncError, SyncResult};
use crate::schema::TableSchema;
use crate::types::CanonicalRecord;

/// Format of version tags, minute granularity.
pub const VERSION_TAG_FORMAT: &str = "%Y%m%d_%H%M";

/// Format of human-readable timestamps in artifacts.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Version of a published snapshot, `YYYYMMDD_HHMM` of its sync time.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VersionTag(String);

impl VersionTag {
    pub fn from_timestamp(timestamp: NaiveDateTime) -> Self {
        Self(timestamp.format(VERSION_TAG_FORMAT).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for VersionTag {
    type Err = SyncError;

    fn from_str(value: &str) -> SyncResult<Self> {
        let value = value.trim();
        let well_formed = value.len() == 13
            && value.char_indices().all(|(i, c)| {
                if i == 8 {
                    c == '_'
                } else {
                    c.is_ascii_digit()
                }
            });

        if !well_formed {
            bail!(
                ErrorKind::InvalidData,
                "Invalid version tag",
                format!("`{value}` does not match YYYYMMDD_HHMM")
            );
        }

        Ok(Self(value.to_string()))
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for VersionTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for VersionTag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        VersionTag::from_str(&value).map_err(serde::de::Error::custom)
    }
}

/// Ordered collection of canonical records taken at one point in time.
#[derive(Debug, Clone)]
pub struct Snapshot {
    schema: Arc<TableSchema>,
    records: Vec<CanonicalRecord>,
    version: VersionTag,
    synced_at: NaiveDateTime,
}

impl Snapshot {
    /// Creates a snapshot whose version is derived from `synced_at`.
    pub fn new(
        schema: Arc<TableSchema>,
        records: Vec<CanonicalRecord>,
        synced_at: NaiveDateTime,
    ) -> Self {
        Self {
            schema,
            records,
            version: VersionTag::from_timestamp(synced_at),
            synced_at,
        }
    }

    /// Creates a snapshot with an explicit version, used when reading a stored one back.
    pub fn with_version(
        schema: Arc<TableSchema>,
        records: Vec<CanonicalRecord>,
        version: VersionTag,
        synced_at: NaiveDateTime,
    ) -> Self {
        Self {
            schema,
            records,
            version,
            synced_at,
        }
    }

    pub fn schema(&self) -> &Arc<TableSchema> {
        &self.schema
    }

    pub fn records(&self) -> &[CanonicalRecord] {
        &self.records
    }

    pub fn version(&self) -> &VersionTag {
        &self.version
    }

    pub fn synced_at(&self) -> NaiveDateTime {
        self.synced_at
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Outcome of a sync cycle as recorded in the status artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncOutcome {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "ERROR")]
    Error,
    #[serde(rename = "NO_CHANGE")]
    NoChange,
}

impl SyncOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncOutcome::Ok => "OK",
            SyncOutcome::Error => "ERROR",
            SyncOutcome::NoChange => "NO_CHANGE",
        }
    }
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of the latest sync cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStatus {
    pub timestamp: NaiveDateTime,
    pub outcome: SyncOutcome,
    pub record_count: usize,
    pub error: Option<String>,
    /// Version of the snapshot that is published after this cycle.
    pub version: VersionTag,
    pub changes_detected: bool,
}

impl SyncStatus {
    /// Status of a cycle that published `snapshot`.
    pub fn published(snapshot: &Snapshot) -> Self {
        Self {
            timestamp: snapshot.synced_at(),
            outcome: SyncOutcome::Ok,
            record_count: snapshot.record_count(),
            error: None,
            version: snapshot.version().clone(),
            changes_detected: true,
        }
    }

    /// Status of a cycle that found the stored snapshot up to date.
    pub fn unchanged(timestamp: NaiveDateTime, stored: &Snapshot) -> Self {
        Self {
            timestamp,
            outcome: SyncOutcome::NoChange,
            record_count: stored.record_count(),
            error: None,
            version: stored.version().clone(),
            changes_detected: false,
        }
    }

    /// Status of a failed cycle. `stored` is the snapshot that stays published, if any.
    ///
    /// Without a stored snapshot the version is derived from `timestamp`.
    pub fn failed(timestamp: NaiveDateTime, error: &SyncError, stored: Option<&Snapshot>) -> Self {
        let (record_count, version) = match stored {
            Some(stored) => (stored.record_count(), stored.version().clone()),
            None => (0, VersionTag::from_timestamp(timestamp)),
        };

        Self {
            timestamp,
            outcome: SyncOutcome::Error,
            record_count,
            error: Some(error.summary()),
            version,
            changes_detected: false,
        }
    }
}
