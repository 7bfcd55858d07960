//! Metric names emitted by snapsync.

/// Label for the source table name.
pub const TABLE_NAME_LABEL: &str = "table_name";

/// Label for the outcome of a sync cycle (`OK`, `NO_CHANGE`, `ERROR`).
pub const OUTCOME_LABEL: &str = "outcome";

/// Label for the error kind of a failure.
pub const ERROR_KIND_LABEL: &str = "error_kind";

// Scan metrics

/// Counter for pages read from the source table.
pub const SNAPSYNC_SCAN_PAGES_TOTAL: &str = "snapsync_scan_pages_total";

/// Counter for page reads that failed.
pub const SNAPSYNC_SCAN_FAILURES_TOTAL: &str = "snapsync_scan_failures_total";

// Sync metrics

/// Counter for completed sync cycles by outcome.
pub const SNAPSYNC_CYCLES_TOTAL: &str = "snapsync_cycles_total";

/// Histogram for the duration of a sync cycle.
pub const SNAPSYNC_CYCLE_DURATION_SECONDS: &str = "snapsync_cycle_duration_seconds";

/// Gauge for the number of records in the latest scanned snapshot.
pub const SNAPSYNC_SNAPSHOT_RECORDS: &str = "snapsync_snapshot_records";

// Deletion metrics

/// Counter for keys deleted from the source table.
pub const SNAPSYNC_DELETED_KEYS_TOTAL: &str = "snapsync_deleted_keys_total";

/// Counter for keys that could not be deleted.
pub const SNAPSYNC_DELETE_FAILED_KEYS_TOTAL: &str = "snapsync_delete_failed_keys_total";
