use pgsync::clients::memory::MemoryDatabase;
use pgsync::error::ErrorKind;
use pgsync::pipeline::SyncPipeline;
use pgsync::schema::TableRef;
use pgsync::sync::table::TableSyncPhase;
use pgsync::test_utils::faults::{FaultPoint, FaultyDatabase};
use pgsync::test_utils::observer::SyncEvent;
use pgsync_config::shared::{RetryConfig, SyncConfig};
use pgsync_telemetry::init_test_tracing;
use std::time::Duration;

use crate::common::{create_run, orders_schema, simple_schema, sync_config};

#[tokio::test]
async fn table_succeeds_on_its_last_attempt() {
    init_test_tracing();

    let source = MemoryDatabase::new();
    source.create_table(orders_schema()).await;
    let target = MemoryDatabase::new();

    let run = create_run(sync_config(&["orders"]), source, target.clone());
    run.source.fail("orders", FaultPoint::Introspect, 2).await;

    let report = run.pipeline.run().await.unwrap();

    let orders = TableRef::unqualified("orders");
    let unit = report.table(&orders).unwrap();
    assert_eq!(unit.phase(), TableSyncPhase::Succeeded);
    assert_eq!(unit.attempts(), 3);
    assert_eq!(unit.last_error().unwrap().kind(), ErrorKind::ConnectionFailed);

    assert_eq!(
        run.sleeper.delays(),
        vec![Duration::from_secs(2), Duration::from_secs(4)]
    );
    assert_eq!(
        run.observer.table_events(&orders),
        vec![
            SyncEvent::Started {
                table: orders.clone(),
                attempt: 1
            },
            SyncEvent::Retrying {
                table: orders.clone(),
                attempt: 1,
                delay: Duration::from_secs(2),
                kind: ErrorKind::ConnectionFailed
            },
            SyncEvent::Started {
                table: orders.clone(),
                attempt: 2
            },
            SyncEvent::Retrying {
                table: orders.clone(),
                attempt: 2,
                delay: Duration::from_secs(4),
                kind: ErrorKind::ConnectionFailed
            },
            SyncEvent::Started {
                table: orders.clone(),
                attempt: 3
            },
            SyncEvent::Done {
                table: orders,
                attempt: 3
            },
        ]
    );

    // Every attempt opens its own connections.
    assert_eq!(run.source.database().connections().await, 3);
    assert_eq!(run.target.database().connections().await, 3);
    assert_eq!(
        target.table_schema(&orders_schema().name).await,
        Some(orders_schema())
    );
}

#[tokio::test]
async fn exhausted_table_does_not_affect_other_tables() {
    init_test_tracing();

    let source = MemoryDatabase::new();
    for name in ["orders", "items", "users"] {
        source.create_table(simple_schema("public", name)).await;
    }
    let target = MemoryDatabase::new();

    let run = create_run(
        sync_config(&["orders", "items", "users"]),
        source,
        target.clone(),
    );
    run.target.fail("items", FaultPoint::ApplyStatement, 5).await;

    let report = run.pipeline.run().await.unwrap();

    assert!(!report.is_success());
    assert_eq!(report.succeeded().len(), 2);

    let items = TableRef::unqualified("items");
    let unit = report.table(&items).unwrap();
    assert_eq!(unit.phase(), TableSyncPhase::Failed);
    assert_eq!(unit.attempts(), 3);
    assert_eq!(unit.last_error().unwrap().kind(), ErrorKind::ConnectionFailed);

    let events = run.observer.table_events(&items);
    assert_eq!(
        events.last(),
        Some(&SyncEvent::Failed {
            table: items,
            attempts: 3,
            kind: ErrorKind::ConnectionFailed
        })
    );
    assert_eq!(run.observer.retries().len(), 2);

    let names: Vec<_> = target
        .table_names()
        .await
        .into_iter()
        .map(|name| name.name)
        .collect();
    assert_eq!(names, vec!["orders".to_owned(), "users".to_owned()]);
}

#[tokio::test]
async fn non_retryable_errors_fail_immediately() {
    init_test_tracing();

    let source = MemoryDatabase::new();
    source.create_table(orders_schema()).await;

    let run = create_run(sync_config(&["orders"]), source, MemoryDatabase::new());
    run.source
        .fail_with("orders", FaultPoint::Introspect, 1, ErrorKind::ConfigError)
        .await;

    let report = run.pipeline.run().await.unwrap();

    let unit = report.table(&TableRef::unqualified("orders")).unwrap();
    assert_eq!(unit.phase(), TableSyncPhase::Failed);
    assert_eq!(unit.attempts(), 1);
    assert!(run.sleeper.delays().is_empty());
}

#[tokio::test]
async fn retry_policy_is_configurable() {
    init_test_tracing();

    let source = MemoryDatabase::new();
    source.create_table(orders_schema()).await;
    let config = SyncConfig {
        retry: RetryConfig {
            max_attempts: 5,
            backoff_step_ms: 100,
        },
        ..sync_config(&["orders"])
    };

    let run = create_run(config, source, MemoryDatabase::new());
    run.source.fail("orders", FaultPoint::Introspect, 4).await;

    let report = run.pipeline.run().await.unwrap();

    let unit = report.table(&TableRef::unqualified("orders")).unwrap();
    assert_eq!(unit.phase(), TableSyncPhase::Succeeded);
    assert_eq!(unit.attempts(), 5);
    assert_eq!(
        run.sleeper.delays(),
        vec![
            Duration::from_millis(100),
            Duration::from_millis(200),
            Duration::from_millis(300),
            Duration::from_millis(400),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn shutdown_during_backoff_cancels_the_table() {
    init_test_tracing();

    let source = MemoryDatabase::new();
    source.create_table(orders_schema()).await;
    let target = FaultyDatabase::wrap(MemoryDatabase::new());
    let source = FaultyDatabase::wrap(source);
    source.fail("orders", FaultPoint::Introspect, 1).await;

    // The tokio timer makes the backoff a real wait.
    let pipeline = SyncPipeline::new(sync_config(&["orders"]), source, target.clone());
    let shutdown_tx = pipeline.shutdown_tx();

    let (report, _) = tokio::join!(pipeline.run(), async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        shutdown_tx.shutdown().unwrap();
    });
    let report = report.unwrap();

    let unit = report.table(&TableRef::unqualified("orders")).unwrap();
    assert_eq!(unit.phase(), TableSyncPhase::Canceled);
    assert_eq!(unit.attempts(), 1);
    assert_eq!(unit.last_error().unwrap().kind(), ErrorKind::OperationCanceled);
    assert!(target.database().table_names().await.is_empty());
}
