//! Implementations of the `snapsync` subcommands.

use std::sync::Arc;

use snapsync::schema::TableSchema;
use snapsync::source::AnySourceTable;
use snapsync::store::file::FileSnapshotStore;
use snapsync_config::shared::SnapsyncConfig;
use tracing::info;

use crate::error::CliResult;

pub mod backup;
pub mod delete;
pub mod stats;
pub mod status;
pub mod sync;

/// Returns the configured table schema, or the built-in job offer schema.
fn table_schema(config: &SnapsyncConfig) -> Arc<TableSchema> {
    let schema = match &config.schema {
        Some(schema) => TableSchema::from(schema),
        None => TableSchema::job_offers(),
    };

    Arc::new(schema)
}

/// Opens the configured source table.
async fn open_source(config: &SnapsyncConfig, schema: &TableSchema) -> CliResult<AnySourceTable> {
    let source = AnySourceTable::from_config(&config.source, schema.key()).await?;
    info!(table = config.source.table_name(), "source table opened");

    Ok(source)
}

fn open_store(config: &SnapsyncConfig, schema: Arc<TableSchema>) -> FileSnapshotStore {
    FileSnapshotStore::new(&config.store, schema)
}
