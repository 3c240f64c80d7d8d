//! Runs against the local Postgres instance used by the test suite, see
//! [`pgsync::test_utils::database::local_pg_connection_config`].

use pgsync::clients::postgres::PgConnector;
use pgsync::pipeline::SyncPipeline;
use pgsync::schema::TableRef;
use pgsync::sync::table::AttemptOutcome;
use pgsync::test_utils::database::spawn_databases;
use pgsync::test_utils::observer::{RecordingObserver, SyncEvent};
use pgsync_telemetry::init_test_tracing;

use crate::common::{data_sync_config, sync_config};

const ORDERS_DDL: &str = r#"
create schema sales;
create table sales.orders (
    id bigint not null,
    customer character varying(120),
    total numeric(12, 2) not null,
    tags text[],
    placed_at timestamptz not null default now()
);
insert into sales.orders (id, customer, total, tags)
select i, 'customer ' || i, i * 1.5, array['a', 'b']
from generate_series(1, 5000) as i;
"#;

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires a local Postgres instance"]
async fn table_is_synced_between_databases() {
    init_test_tracing();

    let (source, target) = spawn_databases().await;
    source.run_sql(ORDERS_DDL).await;
    target.run_sql("create schema sales").await;

    let observer = RecordingObserver::new();
    let pipeline = SyncPipeline::new(
        data_sync_config(&["sales.orders", "sales.missing"]),
        PgConnector::new(source.config.clone()),
        PgConnector::new(target.config.clone()),
    )
    .with_observer(observer.clone());

    let report = pipeline.run().await.unwrap();
    assert!(report.is_success());

    let count: i64 = target
        .client
        .query_one("select count(*) from sales.orders", &[])
        .await
        .unwrap()
        .get(0);
    assert_eq!(count, 5000);

    let checksum_query = "select md5(string_agg(o::text, ',' order by id)) from sales.orders o";
    let source_checksum: String = source
        .client
        .query_one(checksum_query, &[])
        .await
        .unwrap()
        .get(0);
    let target_checksum: String = target
        .client
        .query_one(checksum_query, &[])
        .await
        .unwrap()
        .get(0);
    assert_eq!(source_checksum, target_checksum);
    assert!(observer.events().iter().any(|event| matches!(
        event,
        SyncEvent::TransferCompleted { rows: 5000, .. }
    )));

    let missing = report
        .table(&TableRef::qualified("sales", "missing"))
        .unwrap();
    assert_eq!(missing.outcome(), Some(&AttemptOutcome::Absent));
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires a local Postgres instance"]
async fn unqualified_view_is_not_synced_as_a_table() {
    init_test_tracing();

    let (source, target) = spawn_databases().await;
    source
        .run_sql("create view public.order_totals as select 1::bigint as id, 2.5::numeric as total")
        .await;

    let pipeline = SyncPipeline::new(
        data_sync_config(&["order_totals"]),
        PgConnector::new(source.config.clone()),
        PgConnector::new(target.config.clone()),
    );
    let report = pipeline.run().await.unwrap();

    let unit = report
        .table(&TableRef::unqualified("order_totals"))
        .unwrap();
    assert_eq!(unit.attempts(), 1);
    assert_eq!(unit.outcome(), Some(&AttemptOutcome::Absent));

    let target_tables: i64 = target
        .client
        .query_one(
            "select count(*) from information_schema.tables where table_name = 'order_totals'",
            &[],
        )
        .await
        .unwrap()
        .get(0);
    assert_eq!(target_tables, 0);
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires a local Postgres instance"]
async fn introspected_structure_matches_the_source() {
    init_test_tracing();

    let (source, target) = spawn_databases().await;
    source.run_sql(ORDERS_DDL).await;
    target.run_sql("create schema sales").await;

    let pipeline = SyncPipeline::new(
        sync_config(&["sales.orders"]),
        PgConnector::new(source.config.clone()),
        PgConnector::new(target.config.clone()),
    );
    pipeline.run().await.unwrap();

    let columns_query = r#"
        select column_name::text, data_type::text, character_maximum_length::int4, is_nullable::text
        from information_schema.columns
        where table_schema = 'sales' and table_name = 'orders'
        order by ordinal_position
    "#;
    let describe = |rows: Vec<tokio_postgres::Row>| {
        rows.iter()
            .map(|row| {
                (
                    row.get::<_, String>(0),
                    row.get::<_, String>(1),
                    row.get::<_, Option<i32>>(2),
                    row.get::<_, String>(3),
                )
            })
            .collect::<Vec<_>>()
    };
    let source_columns = describe(source.client.query(columns_query, &[]).await.unwrap());
    let target_columns = describe(target.client.query(columns_query, &[]).await.unwrap());

    assert_eq!(source_columns, target_columns);

    let target_rows: i64 = target
        .client
        .query_one("select count(*) from sales.orders", &[])
        .await
        .unwrap()
        .get(0);
    assert_eq!(target_rows, 0);
}
