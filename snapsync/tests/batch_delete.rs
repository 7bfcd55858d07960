use snapsync::backup::backup_table;
use snapsync::delete::{BATCH_SIZE, BatchDeleter, DeleteConfirmation};
use snapsync::error::ErrorKind;
use snapsync::source::memory::MemorySourceTable;
use snapsync::test_utils::records::{offer_keys, offers, test_timestamp};
use snapsync::test_utils::source::FaultySourceTable;
use snapsync_telemetry::tracing::init_test_tracing;

const TABLE: &str = "ofertas_trabajo";

async fn table(count: usize) -> MemorySourceTable {
    let table = MemorySourceTable::new(TABLE, vec!["ID_Oferta".to_string()]);
    table.insert(offers(count)).await.unwrap();
    table
}

fn confirmed() -> DeleteConfirmation {
    DeleteConfirmation::Confirmed(TABLE.to_string())
}

#[tokio::test(flavor = "multi_thread")]
async fn residual_keys_can_be_retried() {
    init_test_tracing();
    let source = FaultySourceTable::new(table(57).await).fail_delete_batch(1);
    let deleter = BatchDeleter::new(source.clone(), vec!["ID_Oferta".to_string()]);

    let first = deleter
        .delete_all(offer_keys(57), &confirmed())
        .await
        .unwrap();
    assert_eq!(first.succeeded, 32);
    assert_eq!(first.failed, 25);
    assert_eq!(source.delete_batch_sizes().await, vec![25, 25, 7]);

    let residual = first.residual_keys();
    assert_eq!(residual, offer_keys(50)[BATCH_SIZE..].to_vec());

    let retry = deleter.delete_all(residual, &confirmed()).await.unwrap();
    assert!(retry.is_complete());
    assert_eq!(retry.succeeded, 25);
    assert!(source.inner().is_empty().await);
}

#[tokio::test(flavor = "multi_thread")]
async fn every_failing_batch_is_reported() {
    init_test_tracing();
    let source = FaultySourceTable::new(table(60).await)
        .fail_delete_batch(0)
        .fail_delete_batch(2);
    let deleter = BatchDeleter::new(source.clone(), vec!["ID_Oferta".to_string()]);

    let report = deleter.purge(&confirmed()).await.unwrap();

    assert_eq!(report.before, 60);
    assert_eq!(report.after, Some(35));
    let failed: Vec<_> = report
        .deletion
        .failed_batches
        .iter()
        .map(|batch| (batch.index, batch.keys.len(), batch.error.kind()))
        .collect();
    assert_eq!(
        failed,
        vec![
            (0, 25, ErrorKind::BatchDeleteFailure),
            (2, 10, ErrorKind::BatchDeleteFailure)
        ]
    );
    assert_eq!(report.deletion.succeeded, 25);
    assert!((report.deletion.success_rate() - 100.0 * 25.0 / 60.0).abs() < 1e-9);
}

#[tokio::test(flavor = "multi_thread")]
async fn backup_then_purge() {
    init_test_tracing();
    let dir = tempfile::tempdir().unwrap();
    let source = table(40).await;
    let deleter = BatchDeleter::new(source.clone(), vec!["ID_Oferta".to_string()]);

    let backup = backup_table(&source, dir.path(), test_timestamp())
        .await
        .unwrap();
    let report = deleter.purge(&confirmed()).await.unwrap();

    assert_eq!(backup.records, 40);
    assert!(backup.path.exists());
    assert_eq!(report.before, 40);
    assert_eq!(report.after, Some(0));
    assert_eq!(report.deletion.succeeded, 40);
}

#[tokio::test(flavor = "multi_thread")]
async fn purge_requires_the_table_name() {
    init_test_tracing();
    let source = table(3).await;
    let deleter = BatchDeleter::new(source.clone(), vec!["ID_Oferta".to_string()]);

    let err = deleter
        .purge(&DeleteConfirmation::Confirmed("OFERTAS_TRABAJO".to_string()))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ConfirmationMismatch);
    assert_eq!(source.len().await, 3);
}
