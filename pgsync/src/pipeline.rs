//! Orchestration of a sync run.
//!
//! Contains [`SyncPipeline`], which resolves the tables of a run, starts one table sync worker per
//! table and waits for all of them, bounding how many tables are worked on at the same time.

use pgsync_config::shared::SyncConfig;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info};

use crate::clients::base::{Catalog, Connector, SyncSource, SyncTarget};
use crate::concurrency::shutdown::{ShutdownRx, ShutdownTx, create_shutdown_channel};
use crate::error::SyncResult;
use crate::observer::{SyncObserver, TracingObserver};
use crate::schema::{TableName, TableRef, parse_table_list};
use crate::sync::report::SyncReport;
use crate::sync::retry::{Sleeper, TokioSleeper};
use crate::sync::table::TableSyncContext;
use crate::workers::pool::TableSyncWorkerPool;
use crate::workers::table_sync::TableSyncWorker;

/// Syncs the structure, and optionally the rows, of a set of tables from a source database into a
/// target database.
///
/// Every table is synced by its own worker, at most `max_table_sync_workers` of them at a time.
/// Tables are independent: a table that fails after exhausting its attempts doesn't affect the
/// others, and [`SyncPipeline::run`] returns only once every table reached a terminal phase.
#[derive(Debug)]
pub struct SyncPipeline<SC, TC, O = TracingObserver, Z = TokioSleeper> {
    config: Arc<SyncConfig>,
    source: SC,
    target: TC,
    observer: Arc<O>,
    sleeper: Arc<Z>,
    shutdown_tx: ShutdownTx,
    // Kept so that a shutdown sent before `run` is still seen by the workers.
    shutdown_rx: ShutdownRx,
}

impl<SC, TC> SyncPipeline<SC, TC>
where
    SC: Connector,
    SC::Client: SyncSource,
    TC: Connector,
    TC::Client: SyncTarget,
{
    /// Creates a pipeline reporting through [`TracingObserver`] and waiting between attempts with
    /// the tokio timer.
    pub fn new(config: SyncConfig, source: SC, target: TC) -> Self {
        let (shutdown_tx, shutdown_rx) = create_shutdown_channel();

        Self {
            config: Arc::new(config),
            source,
            target,
            observer: Arc::new(TracingObserver),
            sleeper: Arc::new(TokioSleeper),
            shutdown_tx,
            shutdown_rx,
        }
    }
}

impl<SC, TC, O, Z> SyncPipeline<SC, TC, O, Z>
where
    SC: Connector,
    SC::Client: SyncSource,
    TC: Connector,
    TC::Client: SyncTarget,
    O: SyncObserver,
    Z: Sleeper,
{
    /// Replaces the observer receiving the events of the run.
    pub fn with_observer<O2: SyncObserver>(self, observer: O2) -> SyncPipeline<SC, TC, O2, Z> {
        SyncPipeline {
            config: self.config,
            source: self.source,
            target: self.target,
            observer: Arc::new(observer),
            sleeper: self.sleeper,
            shutdown_tx: self.shutdown_tx,
            shutdown_rx: self.shutdown_rx,
        }
    }

    /// Replaces how the pipeline waits between two attempts of a table.
    pub fn with_sleeper<Z2: Sleeper>(self, sleeper: Z2) -> SyncPipeline<SC, TC, O, Z2> {
        SyncPipeline {
            config: self.config,
            source: self.source,
            target: self.target,
            observer: self.observer,
            sleeper: Arc::new(sleeper),
            shutdown_tx: self.shutdown_tx,
            shutdown_rx: self.shutdown_rx,
        }
    }

    /// Returns a handle for sending a shutdown signal to this pipeline.
    pub fn shutdown_tx(&self) -> ShutdownTx {
        self.shutdown_tx.clone()
    }

    /// Asks every table of the run to stop.
    ///
    /// Running attempts are abandoned, tables waiting for a slot or for their next attempt don't
    /// start another one. All of them end up canceled in the report.
    pub fn shutdown(&self) {
        info!("trying to shut down the sync pipeline");

        if let Err(err) = self.shutdown_tx.shutdown() {
            error!("failed to send shutdown signal to the sync pipeline: {}", err);
            return;
        }

        info!("shut down signal successfully sent to all table sync workers");
    }

    /// Syncs every configured table and returns the final state of each.
    ///
    /// Fails only if the configuration is invalid or the tables of the run can't be looked up on
    /// the source. Failures of single tables are reported in the returned [`SyncReport`].
    pub async fn run(&self) -> SyncResult<SyncReport> {
        self.config.validate()?;

        let tables = self.resolve_tables().await?;
        if tables.is_empty() {
            info!("no tables to sync");

            let report = SyncReport::default();
            self.observer.run_completed(&report);

            return Ok(report);
        }

        let max_table_sync_workers =
            (self.config.max_table_sync_workers as usize).min(tables.len());
        info!(
            tables = tables.len(),
            max_table_sync_workers, "starting sync of {} tables", tables.len()
        );

        // Bounds how many tables are worked on at the same time.
        let table_sync_worker_permits = Arc::new(Semaphore::new(max_table_sync_workers));

        let context = TableSyncContext {
            source: self.source.clone(),
            target: self.target.clone(),
            config: self.config.clone(),
            observer: self.observer.clone(),
            sleeper: self.sleeper.clone(),
        };

        let mut pool = TableSyncWorkerPool::new();
        for table in tables {
            let worker = TableSyncWorker::new(
                context.clone(),
                table,
                self.shutdown_rx.clone(),
                table_sync_worker_permits.clone(),
            );
            pool.start_worker(worker).await?;
        }

        info!("waiting for table sync workers to complete");

        let report = SyncReport::new(pool.wait_all().await);
        self.observer.run_completed(&report);

        Ok(report)
    }

    /// Returns the tables of the run: the configured tables in order, followed by the tables of
    /// `schemas_to_sync` that weren't configured already.
    ///
    /// Whenever two entries could name the same table, unqualified names are resolved on the source
    /// and entries are deduplicated on the table they resolve to. Names that resolve to nothing are
    /// kept as they are and end up absent.
    async fn resolve_tables(&self) -> SyncResult<Vec<TableRef>> {
        let configured = parse_table_list(&self.config.tables_to_sync)?;

        if self.config.schemas_to_sync.is_empty() && !has_overlapping_names(&configured) {
            return Ok(configured);
        }

        let source = self.source.connect().await?;

        let mut tables = Vec::with_capacity(configured.len());
        let mut resolved_tables = HashSet::new();
        for table in configured {
            let resolved = match &table.schema {
                Some(schema) => Some(TableName::new(schema.clone(), table.name.clone())),
                None => source
                    .get_table_schema(&table)
                    .await?
                    .map(|table_schema| table_schema.name),
            };

            match resolved {
                Some(table_name) if !resolved_tables.insert(table_name.clone()) => {
                    info!(
                        table = %table,
                        "skipping {table}, it resolves to the already selected table {table_name}"
                    );
                }
                _ => tables.push(table),
            }
        }

        for schema in &self.config.schemas_to_sync {
            let table_names = source.get_schema_table_names(schema).await?;

            info!(
                schema = %schema,
                "the schema '{}' contains {} tables",
                schema,
                table_names.len()
            );

            for table_name in table_names {
                if resolved_tables.insert(table_name.clone()) {
                    tables.push(TableRef::from(table_name));
                }
            }
        }

        Ok(tables)
    }
}

/// Returns whether an unqualified name shares its table name with another entry, in which case
/// both may be the same table.
fn has_overlapping_names(tables: &[TableRef]) -> bool {
    tables.iter().any(|table| {
        table.schema.is_none()
            && tables
                .iter()
                .any(|other| other.schema.is_some() && other.name == table.name)
    })
}
