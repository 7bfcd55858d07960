use std::sync::Arc;
use std::time::Duration;

use snapsync::concurrency::shutdown::create_shutdown_channel;
use snapsync::error::ErrorKind;
use snapsync::schema::TableSchema;
use snapsync::source::memory::MemorySourceTable;
use snapsync::store::SnapshotStore;
use snapsync::store::file::FileSnapshotStore;
use snapsync::store::memory::MemorySnapshotStore;
use snapsync::sync::{Clock, SyncOrchestrator};
use snapsync::test_utils::clock::FixedClock;
use snapsync::test_utils::records::{offer, offers, test_timestamp};
use snapsync::test_utils::source::FaultySourceTable;
use snapsync::types::{RawValue, SyncOutcome};
use snapsync_config::shared::{StoreConfig, SyncConfig};
use snapsync_telemetry::tracing::init_test_tracing;

const TABLE: &str = "ofertas_trabajo";

async fn source(count: usize) -> FaultySourceTable {
    let table = MemorySourceTable::new(TABLE, vec!["ID_Oferta".to_string()]);
    table.insert(offers(count)).await.unwrap();
    FaultySourceTable::new(table)
}

#[tokio::test(flavor = "multi_thread")]
async fn publish_skip_and_fail_keep_last_good_snapshot() {
    init_test_tracing();
    let dir = tempfile::tempdir().unwrap();
    let schema = Arc::new(TableSchema::job_offers());
    let store = FileSnapshotStore::new(
        &StoreConfig {
            directory: dir.path().to_path_buf(),
            ..StoreConfig::default()
        },
        schema.clone(),
    );
    let clock = FixedClock::new(test_timestamp());
    let orchestrator = SyncOrchestrator::new(
        source(12).await,
        store.clone(),
        schema,
        &SyncConfig::default(),
    )
    .with_clock(clock.clone());

    // First cycle publishes into an empty store.
    let first = orchestrator.run_cycle().await;
    assert_eq!(first.outcome, SyncOutcome::Ok);
    assert_eq!(first.record_count, 12);
    let published = std::fs::read(store.snapshot_path()).unwrap();

    // Same content later: nothing is rewritten and the version is kept.
    clock.advance_minutes(30);
    let second = orchestrator.run_cycle().await;
    assert_eq!(second.outcome, SyncOutcome::NoChange);
    assert_eq!(second.version, first.version);
    assert_eq!(std::fs::read(store.snapshot_path()).unwrap(), published);
    let status = store.read_status().await.unwrap().unwrap();
    assert_eq!(status.outcome, SyncOutcome::NoChange);
    assert!(!status.changes_detected);
    assert_eq!(status.timestamp, clock.now());

    // A failing scan records the error and leaves the body alone.
    clock.advance_minutes(30);
    orchestrator.source().fail_all_scans().await;
    let third = orchestrator.run_cycle().await;
    assert_eq!(third.outcome, SyncOutcome::Error);
    assert_eq!(third.error.as_ref().unwrap().kind(), ErrorKind::ScanFailure);
    assert_eq!(third.record_count, 12);
    assert_eq!(std::fs::read(store.snapshot_path()).unwrap(), published);

    let status = store.read_status().await.unwrap().unwrap();
    assert_eq!(status.outcome, SyncOutcome::Error);
    assert_eq!(status.record_count, 12);
    assert_eq!(Some(status.version.clone()), first.version);
    assert!(status.error.unwrap().contains("Table scan aborted"));
    let metadata: serde_json::Value =
        serde_json::from_slice(&std::fs::read(store.metadata_path()).unwrap()).unwrap();
    assert_eq!(metadata["version"], "20240307_0930");
    assert_eq!(store.read_last().await.unwrap().record_count(), 12);
}

#[tokio::test(flavor = "multi_thread")]
async fn version_only_changes_with_content() {
    init_test_tracing();
    let clock = FixedClock::new(test_timestamp());
    let orchestrator = SyncOrchestrator::new(
        source(3).await,
        MemorySnapshotStore::new(),
        Arc::new(TableSchema::job_offers()),
        &SyncConfig::default(),
    )
    .with_clock(clock.clone());

    let first = orchestrator.run_cycle().await;

    clock.advance_minutes(5);
    let mut changed = offer("of-001");
    changed.insert("Ciudad".to_string(), RawValue::from("Heredia"));
    orchestrator
        .source()
        .inner()
        .insert([changed])
        .await
        .unwrap();
    let second = orchestrator.run_cycle().await;

    assert_eq!(second.outcome, SyncOutcome::Ok);
    assert_ne!(second.version, first.version);
    assert_eq!(second.version.unwrap().as_str(), "20240307_0935");
    assert_eq!(orchestrator.store().body_writes().await, 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn scheduled_sync_survives_failed_cycles_and_stops_on_shutdown() {
    init_test_tracing();
    let orchestrator = Arc::new(
        SyncOrchestrator::new(
            source(5).await.fail_scan_page(0),
            MemorySnapshotStore::new(),
            Arc::new(TableSchema::job_offers()),
            &SyncConfig::default(),
        )
        .with_clock(FixedClock::new(test_timestamp())),
    );
    let (shutdown_tx, shutdown_rx) = create_shutdown_channel();

    let task = tokio::spawn({
        let orchestrator = orchestrator.clone();
        async move {
            orchestrator
                .run_on_interval(Duration::from_millis(10), shutdown_rx)
                .await
        }
    });

    tokio::time::timeout(Duration::from_secs(10), async {
        while orchestrator.store().status_history().await.len() < 3 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    shutdown_tx.shutdown();
    let cycles = tokio::time::timeout(Duration::from_secs(10), task)
        .await
        .unwrap()
        .unwrap();
    assert!(cycles >= 3);

    let outcomes: Vec<_> = orchestrator
        .store()
        .status_history()
        .await
        .into_iter()
        .map(|status| status.outcome)
        .take(3)
        .collect();
    assert_eq!(
        outcomes,
        vec![SyncOutcome::Error, SyncOutcome::Ok, SyncOutcome::NoChange]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn tags_containing_the_cell_separator_compare_unchanged() {
    init_test_tracing();
    let dir = tempfile::tempdir().unwrap();
    let schema = Arc::new(TableSchema::job_offers());
    let store = FileSnapshotStore::new(
        &StoreConfig {
            directory: dir.path().to_path_buf(),
            ..StoreConfig::default()
        },
        schema.clone(),
    );
    let clock = FixedClock::new(test_timestamp());
    let source = source(2).await;
    let mut tooling = offer("of-000");
    tooling.insert(
        "Herramientas_Lista".to_string(),
        RawValue::List(vec![RawValue::from("ci | cd"), RawValue::from("docker")]),
    );
    source.inner().insert([tooling]).await.unwrap();
    let orchestrator = SyncOrchestrator::new(source, store.clone(), schema, &SyncConfig::default())
        .with_clock(clock.clone());

    let mut outcomes = Vec::new();
    for _ in 0..3 {
        outcomes.push(orchestrator.run_cycle().await.outcome);
        clock.advance_minutes(30);
    }

    assert_eq!(
        outcomes,
        vec![SyncOutcome::Ok, SyncOutcome::NoChange, SyncOutcome::NoChange]
    );
    let stored = store.read_last().await.unwrap();
    let index = stored.schema().index_of("Herramientas_Lista").unwrap();
    let tags = stored.records()[0].values()[index].as_tags().unwrap();
    assert_eq!(tags.iter().collect::<Vec<_>>(), vec!["Ci | Cd", "Docker"]);
}
