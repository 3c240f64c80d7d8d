use bytes::Bytes;
use pgsync::clients::memory::MemoryDatabase;
use pgsync::error::ErrorKind;
use pgsync::schema::{ColumnSchema, TableRef, TableSchema};
use pgsync::sync::table::{AttemptOutcome, TableSyncPhase};
use pgsync::sync::transfer::TransferStats;
use pgsync::test_utils::faults::FaultPoint;
use pgsync::test_utils::observer::SyncEvent;
use pgsync_config::shared::{SyncConfig, TransferConfig};
use pgsync_telemetry::init_test_tracing;
use std::time::Duration;

use crate::common::{
    create_run, create_table_with_rows, data_sync_config, orders_schema, sample_rows, table_name,
};

#[tokio::test]
async fn rows_are_copied_byte_for_byte() {
    init_test_tracing();

    let rows = sample_rows(1000);
    let source = MemoryDatabase::new();
    create_table_with_rows(&source, orders_schema(), rows.clone()).await;
    let target = MemoryDatabase::new();

    let run = create_run(data_sync_config(&["orders"]), source, target.clone());
    let report = run.pipeline.run().await.unwrap();

    let expected_stats = TransferStats {
        bytes: rows.iter().map(|row| row.len() as u64 + 4).sum(),
        rows: 1000,
    };
    let unit = report.table(&TableRef::unqualified("orders")).unwrap();
    assert_eq!(
        unit.outcome(),
        Some(&AttemptOutcome::Synced {
            table: orders_schema().name,
            transfer: Some(expected_stats)
        })
    );
    assert_eq!(target.rows(&orders_schema().name).await, Some(rows));
    assert!(run.observer.events().contains(&SyncEvent::TransferCompleted {
        table: orders_schema().name,
        bytes: expected_stats.bytes,
        rows: 1000
    }));
}

#[tokio::test]
async fn empty_table_copies_no_rows() {
    init_test_tracing();

    let source = MemoryDatabase::new();
    source.create_table(orders_schema()).await;
    let target = MemoryDatabase::new();

    let run = create_run(data_sync_config(&["orders"]), source, target.clone());
    let report = run.pipeline.run().await.unwrap();

    assert!(report.is_success());
    assert_eq!(target.rows(&orders_schema().name).await, Some(vec![]));
}

#[tokio::test]
async fn progress_is_reported_per_threshold() {
    init_test_tracing();

    let table_schema = TableSchema::new(
        table_name("public", "blobs"),
        vec![ColumnSchema::new(
            "payload".to_owned(),
            "bytea".to_owned(),
            None,
            false,
        )],
    );
    // 40 rows of 100 kB are a bit less than 4 MiB.
    let rows: Vec<Bytes> = (0..40u8).map(|i| Bytes::from(vec![i; 100_000])).collect();
    let source = MemoryDatabase::new();
    create_table_with_rows(&source, table_schema.clone(), rows).await;

    let config = SyncConfig {
        transfer: TransferConfig {
            chunk_size_bytes: 64 * 1024,
            progress_threshold_bytes: 1024 * 1024,
        },
        ..data_sync_config(&["blobs"])
    };
    let run = create_run(config, source, MemoryDatabase::new());
    run.pipeline.run().await.unwrap();

    assert_eq!(run.observer.progress(&table_schema.name), vec![1, 2, 3]);
}

#[tokio::test]
async fn failed_commit_leaves_the_target_table_empty() {
    init_test_tracing();

    let source = MemoryDatabase::new();
    create_table_with_rows(&source, orders_schema(), sample_rows(50)).await;
    let target = MemoryDatabase::new();

    let run = create_run(data_sync_config(&["orders"]), source, target.clone());
    run.target
        .fail_with("orders", FaultPoint::FinishCopyIn, 3, ErrorKind::CopyFailed)
        .await;

    let report = run.pipeline.run().await.unwrap();

    let unit = report.table(&TableRef::unqualified("orders")).unwrap();
    assert_eq!(unit.phase(), TableSyncPhase::Failed);
    assert_eq!(unit.last_error().unwrap().kind(), ErrorKind::CopyFailed);
    assert_eq!(target.rows(&orders_schema().name).await, Some(vec![]));
}

#[tokio::test]
async fn aborted_copy_is_not_duplicated_on_retry() {
    init_test_tracing();

    let rows = sample_rows(2000);
    let source = MemoryDatabase::new();
    create_table_with_rows(&source, orders_schema(), rows.clone()).await;
    let target = MemoryDatabase::new();

    let run = create_run(data_sync_config(&["orders"]), source, target.clone());
    run.source.fail("orders", FaultPoint::CopyOutStream, 1).await;
    run.target.fail("orders", FaultPoint::FinishCopyIn, 1).await;

    let report = run.pipeline.run().await.unwrap();

    let unit = report.table(&TableRef::unqualified("orders")).unwrap();
    assert_eq!(unit.phase(), TableSyncPhase::Succeeded);
    assert_eq!(unit.attempts(), 3);
    assert_eq!(target.rows(&orders_schema().name).await, Some(rows));
}

#[tokio::test]
async fn copy_that_fails_to_start_is_retried() {
    init_test_tracing();

    let rows = sample_rows(50);
    let source = MemoryDatabase::new();
    create_table_with_rows(&source, orders_schema(), rows.clone()).await;
    let target = MemoryDatabase::new();

    let run = create_run(data_sync_config(&["orders"]), source, target.clone());
    run.source.fail("orders", FaultPoint::CopyOut, 1).await;

    let report = run.pipeline.run().await.unwrap();

    let orders = TableRef::unqualified("orders");
    let unit = report.table(&orders).unwrap();
    assert_eq!(unit.phase(), TableSyncPhase::Succeeded);
    assert_eq!(unit.attempts(), 2);
    assert_eq!(
        unit.last_error().map(|err| err.kind()),
        Some(ErrorKind::ConnectionFailed)
    );
    assert_eq!(
        run.observer.retries(),
        vec![SyncEvent::Retrying {
            table: orders,
            attempt: 1,
            delay: Duration::from_secs(2),
            kind: ErrorKind::ConnectionFailed
        }]
    );
    assert_eq!(target.rows(&orders_schema().name).await, Some(rows));
}

#[tokio::test]
async fn target_rows_are_truncated_before_the_copy() {
    init_test_tracing();

    let rows = sample_rows(20);
    let source = MemoryDatabase::new();
    create_table_with_rows(&source, orders_schema(), rows.clone()).await;
    let target = MemoryDatabase::new();
    create_table_with_rows(&target, orders_schema(), sample_rows(5)).await;

    let config = SyncConfig {
        truncate_before_copy: true,
        ..data_sync_config(&["orders"])
    };
    let run = create_run(config, source, target.clone());
    run.pipeline.run().await.unwrap();

    assert_eq!(target.rows(&orders_schema().name).await, Some(rows));
}

#[tokio::test]
async fn existing_target_rows_are_kept_without_truncation() {
    init_test_tracing();

    let rows = sample_rows(20);
    let existing = vec![Bytes::from_static(b"existing")];
    let source = MemoryDatabase::new();
    create_table_with_rows(&source, orders_schema(), rows.clone()).await;
    let target = MemoryDatabase::new();
    create_table_with_rows(&target, orders_schema(), existing.clone()).await;

    let run = create_run(data_sync_config(&["orders"]), source, target.clone());
    run.pipeline.run().await.unwrap();

    let mut expected = existing;
    expected.extend(rows);
    assert_eq!(target.rows(&orders_schema().name).await, Some(expected));
}

#[tokio::test]
async fn incompatible_target_layout_is_rejected() {
    init_test_tracing();

    let source = MemoryDatabase::new();
    create_table_with_rows(&source, orders_schema(), sample_rows(10)).await;

    let mut target_schema = orders_schema();
    target_schema.column_schemas[2].data_type = "text".to_owned();
    let target = MemoryDatabase::new();
    target.create_table(target_schema).await;

    let config = SyncConfig {
        validate_target_layout: true,
        ..data_sync_config(&["orders"])
    };
    let run = create_run(config, source, target.clone());
    let report = run.pipeline.run().await.unwrap();

    let unit = report.table(&TableRef::unqualified("orders")).unwrap();
    assert_eq!(unit.phase(), TableSyncPhase::Failed);
    assert_eq!(unit.last_error().unwrap().kind(), ErrorKind::SchemaMismatch);
    assert_eq!(target.rows(&orders_schema().name).await, Some(vec![]));
}
