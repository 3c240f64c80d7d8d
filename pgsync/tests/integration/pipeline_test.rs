use pgsync::clients::memory::MemoryDatabase;
use pgsync::schema::TableRef;
use pgsync::sync::table::{AttemptOutcome, TableSyncPhase};
use pgsync::test_utils::observer::SyncEvent;
use pgsync_config::shared::SyncConfig;
use pgsync_telemetry::init_test_tracing;
use std::time::Duration;

use crate::common::{
    create_run, create_table_with_rows, data_sync_config, orders_schema, sample_rows,
    simple_schema, sync_config, table_name,
};

#[tokio::test]
async fn table_structure_is_created_without_rows() {
    init_test_tracing();

    let source = MemoryDatabase::new();
    create_table_with_rows(&source, orders_schema(), sample_rows(10)).await;
    let target = MemoryDatabase::new();

    let run = create_run(sync_config(&["orders"]), source, target.clone());
    let report = run.pipeline.run().await.unwrap();

    assert!(report.is_success());
    let orders = TableRef::unqualified("orders");
    let unit = report.table(&orders).unwrap();
    assert_eq!(unit.phase(), TableSyncPhase::Succeeded);
    assert_eq!(unit.attempts(), 1);
    assert_eq!(
        unit.outcome(),
        Some(&AttemptOutcome::Synced {
            table: orders_schema().name,
            transfer: None
        })
    );

    let target_schema = target.table_schema(&orders_schema().name).await.unwrap();
    assert_eq!(target_schema, orders_schema());
    assert_eq!(target.rows(&orders_schema().name).await, Some(vec![]));
    assert_eq!(
        target.executed_statements().await,
        vec![orders_schema().create_table_statement()]
    );

    assert_eq!(
        run.observer.table_events(&orders),
        vec![
            SyncEvent::Started {
                table: orders.clone(),
                attempt: 1
            },
            SyncEvent::Done {
                table: orders,
                attempt: 1
            },
        ]
    );
    assert_eq!(
        run.observer.events().last(),
        Some(&SyncEvent::RunCompleted { tables: 1 })
    );
}

#[tokio::test]
async fn missing_source_table_is_skipped() {
    init_test_tracing();

    let target = MemoryDatabase::new();
    let run = create_run(sync_config(&["ghost"]), MemoryDatabase::new(), target.clone());

    let report = run.pipeline.run().await.unwrap();

    let ghost = TableRef::unqualified("ghost");
    let unit = report.table(&ghost).unwrap();
    assert_eq!(unit.phase(), TableSyncPhase::Succeeded);
    assert_eq!(unit.outcome(), Some(&AttemptOutcome::Absent));

    assert!(target.table_names().await.is_empty());
    assert!(target.executed_statements().await.is_empty());
    assert_eq!(
        run.observer.table_events(&ghost),
        vec![
            SyncEvent::Started {
                table: ghost.clone(),
                attempt: 1
            },
            SyncEvent::Absent {
                table: ghost.clone()
            },
            SyncEvent::Done {
                table: ghost,
                attempt: 1
            },
        ]
    );
}

#[tokio::test]
async fn repeated_runs_leave_the_target_unchanged() {
    init_test_tracing();

    let source = MemoryDatabase::new();
    source.create_table(orders_schema()).await;
    let target = MemoryDatabase::new();

    for _ in 0..2 {
        let run = create_run(sync_config(&["orders"]), source.clone(), target.clone());
        let report = run.pipeline.run().await.unwrap();
        assert!(report.is_success());
    }

    assert_eq!(target.table_names().await, vec![orders_schema().name]);
    assert_eq!(
        target.table_schema(&orders_schema().name).await,
        Some(orders_schema())
    );

    let statements = target.executed_statements().await;
    assert_eq!(statements.len(), 2);
    assert_eq!(statements[0], statements[1]);
}

#[tokio::test]
async fn same_source_produces_the_same_statements() {
    init_test_tracing();

    let source = MemoryDatabase::new();
    source.create_table(orders_schema()).await;
    source.create_table(simple_schema("public", "items")).await;

    let mut statements = Vec::new();
    for _ in 0..2 {
        let target = MemoryDatabase::new();
        let run = create_run(sync_config(&["orders", "items"]), source.clone(), target.clone());
        run.pipeline.run().await.unwrap();

        let mut executed = target.executed_statements().await;
        // Tables run concurrently, so only the set of statements is stable.
        executed.sort();
        statements.push(executed);
    }

    assert_eq!(statements[0], statements[1]);
    assert_eq!(statements[0].len(), 2);
}

#[tokio::test]
async fn report_keeps_the_configured_order() {
    init_test_tracing();

    let source = MemoryDatabase::new();
    for name in ["c", "a", "b"] {
        source.create_table(simple_schema("public", name)).await;
    }
    let config = sync_config(&["c", "a", "public.b", "a"]);
    let run = create_run(config, source, MemoryDatabase::new());

    let report = run.pipeline.run().await.unwrap();

    let tables: Vec<_> = report.tables().iter().map(|unit| unit.table().clone()).collect();
    assert_eq!(
        tables,
        vec![
            TableRef::unqualified("c"),
            TableRef::unqualified("a"),
            TableRef::qualified("public", "b"),
        ]
    );
}

#[tokio::test]
async fn unqualified_names_are_resolved_through_the_search_path() {
    init_test_tracing();

    let source = MemoryDatabase::new();
    source
        .set_search_path(vec!["sales".to_owned(), "public".to_owned()])
        .await;
    source.create_table(simple_schema("sales", "orders")).await;
    source.create_table(simple_schema("public", "orders")).await;
    let target = MemoryDatabase::new();

    let run = create_run(sync_config(&["orders"]), source, target.clone());
    run.pipeline.run().await.unwrap();

    assert_eq!(target.table_names().await, vec![table_name("sales", "orders")]);
}

#[tokio::test]
async fn tables_of_configured_schemas_are_synced() {
    init_test_tracing();

    let source = MemoryDatabase::new();
    source.create_table(simple_schema("sales", "orders")).await;
    source.create_table(simple_schema("sales", "customers")).await;
    source.create_table(simple_schema("public", "audit")).await;
    let target = MemoryDatabase::new();

    let config = SyncConfig {
        schemas_to_sync: vec!["sales".to_owned()],
        ..SyncConfig::default()
    };
    let run = create_run(config, source, target.clone());
    let report = run.pipeline.run().await.unwrap();

    let tables: Vec<_> = report.tables().iter().map(|unit| unit.table().clone()).collect();
    assert_eq!(
        tables,
        vec![
            TableRef::qualified("sales", "customers"),
            TableRef::qualified("sales", "orders"),
        ]
    );
    assert_eq!(
        target.table_names().await,
        vec![
            table_name("sales", "customers"),
            table_name("sales", "orders"),
        ]
    );
}

#[tokio::test]
async fn configured_table_inside_a_configured_schema_is_copied_once() {
    init_test_tracing();

    let source = MemoryDatabase::new();
    let rows = sample_rows(3);
    create_table_with_rows(&source, orders_schema(), rows.clone()).await;
    let target = MemoryDatabase::new();

    let config = SyncConfig {
        schemas_to_sync: vec!["public".to_owned()],
        ..data_sync_config(&["orders"])
    };
    let run = create_run(config, source, target.clone());
    let report = run.pipeline.run().await.unwrap();

    assert!(report.is_success());
    assert_eq!(report.tables().len(), 1);
    assert_eq!(
        report.tables()[0].table(),
        &TableRef::unqualified("orders")
    );
    assert_eq!(
        target.rows(&table_name("public", "orders")).await,
        Some(rows)
    );
}

#[tokio::test]
async fn empty_table_list_is_a_no_op() {
    init_test_tracing();

    let run = create_run(SyncConfig::default(), MemoryDatabase::new(), MemoryDatabase::new());

    let report = run.pipeline.run().await.unwrap();

    assert!(report.tables().is_empty());
    assert!(report.is_success());
    assert_eq!(run.source.database().connections().await, 0);
    assert_eq!(
        run.observer.events(),
        vec![SyncEvent::RunCompleted { tables: 0 }]
    );
}

#[tokio::test(start_paused = true)]
async fn concurrent_tables_are_bounded_by_the_worker_ceiling() {
    init_test_tracing();

    let source = MemoryDatabase::new();
    let names: Vec<String> = (0..10).map(|i| format!("table_{i}")).collect();
    for name in &names {
        source.create_table(simple_schema("public", name)).await;
    }
    let tables: Vec<&str> = names.iter().map(String::as_str).collect();
    let target = MemoryDatabase::new();

    let run = create_run(sync_config(&tables), source, target.clone());
    run.source
        .set_introspect_delay(Duration::from_millis(100))
        .await;

    let report = run.pipeline.run().await.unwrap();

    assert!(report.is_success());
    assert_eq!(report.succeeded().len(), 10);
    assert_eq!(run.source.max_concurrent_introspections(), 4);
    assert_eq!(target.table_names().await.len(), 10);
}

#[tokio::test(start_paused = true)]
async fn fewer_tables_than_workers_run_all_at_once() {
    init_test_tracing();

    let source = MemoryDatabase::new();
    for name in ["a", "b"] {
        source.create_table(simple_schema("public", name)).await;
    }

    let run = create_run(sync_config(&["a", "b"]), source, MemoryDatabase::new());
    run.source
        .set_introspect_delay(Duration::from_millis(100))
        .await;

    run.pipeline.run().await.unwrap();

    assert_eq!(run.source.max_concurrent_introspections(), 2);
}

#[tokio::test(start_paused = true)]
async fn custom_worker_ceiling_is_honored() {
    init_test_tracing();

    let source = MemoryDatabase::new();
    for name in ["a", "b", "c", "d", "e"] {
        source.create_table(simple_schema("public", name)).await;
    }
    let config = SyncConfig {
        max_table_sync_workers: 2,
        ..sync_config(&["a", "b", "c", "d", "e"])
    };

    let run = create_run(config, source, MemoryDatabase::new());
    run.source
        .set_introspect_delay(Duration::from_millis(100))
        .await;

    let report = run.pipeline.run().await.unwrap();

    assert_eq!(report.succeeded().len(), 5);
    assert_eq!(run.source.max_concurrent_introspections(), 2);
}

#[tokio::test]
async fn shutdown_before_run_cancels_every_table() {
    init_test_tracing();

    let source = MemoryDatabase::new();
    source.create_table(orders_schema()).await;
    let target = MemoryDatabase::new();

    let run = create_run(sync_config(&["orders", "items"]), source, target.clone());
    run.pipeline.shutdown();

    let report = run.pipeline.run().await.unwrap();

    assert!(!report.is_success());
    assert_eq!(report.canceled().len(), 2);
    assert!(target.table_names().await.is_empty());
    assert_eq!(run.source.database().connections().await, 0);

    let canceled = run
        .observer
        .events()
        .into_iter()
        .filter(|event| matches!(event, SyncEvent::Canceled { .. }))
        .count();
    assert_eq!(canceled, 2);
}

#[tokio::test(start_paused = true)]
async fn shutdown_during_run_stops_running_attempts() {
    init_test_tracing();

    let source = MemoryDatabase::new();
    for name in ["a", "b", "c", "d", "e", "f"] {
        source.create_table(simple_schema("public", name)).await;
    }
    let target = MemoryDatabase::new();

    let run = create_run(sync_config(&["a", "b", "c", "d", "e", "f"]), source, target.clone());
    run.source.set_introspect_delay(Duration::from_secs(10)).await;
    let shutdown_tx = run.pipeline.shutdown_tx();

    let (report, _) = tokio::join!(run.pipeline.run(), async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        shutdown_tx.shutdown().unwrap();
    });
    let report = report.unwrap();

    assert_eq!(report.canceled().len(), 6);
    for unit in report.tables() {
        // Running tables were stopped in their first attempt, waiting ones never started.
        assert!(unit.attempts() <= 1);
    }
    assert!(target.table_names().await.is_empty());
}
