use std::sync::Arc;

use snapsync::delete::{BatchDeleter, DeleteConfirmation};
use snapsync::error::ErrorKind;
use snapsync::schema::TableSchema;
use snapsync::source::memory::MemorySourceTable;
use snapsync::store::SnapshotStore;
use snapsync::store::file::FileSnapshotStore;
use snapsync::sync::SyncOrchestrator;
use snapsync::test_utils::clock::FixedClock;
use snapsync::test_utils::failpoints::CustomFailScenario;
use snapsync::test_utils::records::{offer_snapshot, offers, test_timestamp};
use snapsync::types::SyncOutcome;
use snapsync::{
    DELETER__BEFORE_BATCH, FILE_STORE__AFTER_BODY_WRITE, FILE_STORE__BEFORE_BODY_RENAME,
    SCANNER__BEFORE_PAGE,
};
use snapsync_config::shared::{StoreConfig, SyncConfig};
use snapsync_telemetry::tracing::init_test_tracing;

const TABLE: &str = "ofertas_trabajo";

fn file_store(directory: &std::path::Path) -> FileSnapshotStore {
    FileSnapshotStore::new(
        &StoreConfig {
            directory: directory.to_path_buf(),
            ..StoreConfig::default()
        },
        Arc::new(TableSchema::job_offers()),
    )
}

async fn table(count: usize) -> MemorySourceTable {
    let table = MemorySourceTable::new(TABLE, vec!["ID_Oferta".to_string()]);
    table.insert(offers(count)).await.unwrap();
    table
}

#[tokio::test(flavor = "multi_thread")]
async fn failure_before_body_rename_keeps_previous_snapshot() {
    init_test_tracing();
    // The first body write goes through, the next one fails.
    let scenario =
        CustomFailScenario::setup(&[(FILE_STORE__BEFORE_BODY_RENAME, "1*off->return")]);
    let dir = tempfile::tempdir().unwrap();
    let store = file_store(dir.path());
    store.write(&offer_snapshot(3)).await.unwrap();
    let body = std::fs::read(store.snapshot_path()).unwrap();
    let metadata = std::fs::read(store.metadata_path()).unwrap();

    let err = store.write(&offer_snapshot(5)).await.unwrap_err();
    scenario.teardown();

    assert_eq!(err.kind(), ErrorKind::StoreWriteFailure);
    assert_eq!(std::fs::read(store.snapshot_path()).unwrap(), body);
    assert_eq!(std::fs::read(store.metadata_path()).unwrap(), metadata);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn failure_between_body_and_metadata_is_recorded() {
    init_test_tracing();
    let scenario = CustomFailScenario::setup(&[(FILE_STORE__AFTER_BODY_WRITE, "1*off->return")]);
    let dir = tempfile::tempdir().unwrap();
    let store = file_store(dir.path());
    let orchestrator = SyncOrchestrator::new(
        table(3).await,
        store.clone(),
        Arc::new(TableSchema::job_offers()),
        &SyncConfig::default(),
    )
    .with_clock(FixedClock::new(test_timestamp()));
    orchestrator.run_cycle().await.into_result().unwrap();

    orchestrator.source().insert(offers(4)).await.unwrap();
    let report = orchestrator.run_cycle().await;
    scenario.teardown();

    assert_eq!(report.outcome, SyncOutcome::Error);
    assert_eq!(
        report.error.unwrap().kind(),
        ErrorKind::StoreWriteFailure
    );

    // The new body was fully replaced; the metadata records the failure against it.
    let stored = store.read_last().await.unwrap();
    assert_eq!(stored.record_count(), 4);
    let status = store.read_status().await.unwrap().unwrap();
    assert_eq!(status.outcome, SyncOutcome::Error);
    assert_eq!(status.record_count, 4);
}

#[tokio::test(flavor = "multi_thread")]
async fn scan_failpoint_fails_the_cycle() {
    init_test_tracing();
    let scenario = CustomFailScenario::setup(&[(SCANNER__BEFORE_PAGE, "return(io)")]);
    let dir = tempfile::tempdir().unwrap();
    let store = file_store(dir.path());
    let orchestrator = SyncOrchestrator::new(
        table(3).await,
        store.clone(),
        Arc::new(TableSchema::job_offers()),
        &SyncConfig::default(),
    );

    let report = orchestrator.run_cycle().await;
    scenario.teardown();

    assert_eq!(report.outcome, SyncOutcome::Error);
    assert_eq!(report.error.unwrap().kind(), ErrorKind::ScanFailure);
    assert!(!store.snapshot_path().exists());
    let status = store.read_status().await.unwrap().unwrap();
    assert_eq!(status.outcome, SyncOutcome::Error);
    assert_eq!(status.record_count, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn failing_batches_do_not_abort_deletion() {
    init_test_tracing();
    let scenario = CustomFailScenario::setup(&[(DELETER__BEFORE_BATCH, "return")]);
    let source = table(30).await;
    let deleter = BatchDeleter::new(source.clone(), vec!["ID_Oferta".to_string()]);

    let report = deleter
        .purge(&DeleteConfirmation::Confirmed(TABLE.to_string()))
        .await
        .unwrap();
    scenario.teardown();

    assert_eq!(report.deletion.failed_batches.len(), 2);
    assert_eq!(report.deletion.failed, 30);
    assert_eq!(report.after, Some(30));
    assert_eq!(source.len().await, 30);
}
