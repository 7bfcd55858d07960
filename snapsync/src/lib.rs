//! Periodic snapshot synchronization of a key-value table into a file-based dataset.
//!
//! A sync cycle reads the whole source table with [`scan::TableScanner`], normalizes every
//! item into a [`types::CanonicalRecord`] with [`conversions::normalize::FieldNormalizer`],
//! compares the result with the last published [`types::Snapshot`] and publishes it through
//! a [`store::SnapshotStore`] only when its content changed. [`sync::SyncOrchestrator`]
//! drives cycles once or on an interval, and [`delete::BatchDeleter`] empties tables in
//! fixed-size batches with per-batch failure isolation.

pub mod backup;
pub mod compare;
pub mod concurrency;
pub mod conversions;
pub mod delete;
pub mod enrich;
pub mod error;
mod failpoints;
mod macros;
pub mod metrics;
pub mod scan;
pub mod schema;
pub mod source;
pub mod store;
pub mod summary;
pub mod sync;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;

pub use failpoints::{
    DELETER__BEFORE_BATCH, FILE_STORE__AFTER_BODY_WRITE, FILE_STORE__BEFORE_BODY_RENAME,
    SCANNER__BEFORE_PAGE,
};
