use pgsync_config::shared::SyncConfig;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::clients::base::{Connector, SyncSource, SyncTarget};
use crate::error::{SyncError, SyncResult};
use crate::observer::SyncObserver;
use crate::schema::{TableName, TableRef};
use crate::sync::structure::{apply_table_structure, introspect_table, validate_target_layout};
use crate::sync::transfer::{TransferStats, transfer_table_data};

/// Phase of a table within a sync run.
///
/// A table moves from [`TableSyncPhase::Pending`] to [`TableSyncPhase::Attempting`], and from
/// there either to a terminal phase or to [`TableSyncPhase::Retrying`], which leads to the next
/// attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableSyncPhase {
    /// Waiting for a worker slot.
    Pending,
    /// An attempt is running.
    Attempting,
    /// The last attempt failed and the table waits for its next attempt.
    Retrying,
    /// The table was synced, or doesn't exist on the source.
    Succeeded,
    /// The attempts are exhausted, or the error can't be retried.
    Failed,
    /// The run was shut down before the table was synced.
    Canceled,
}

impl TableSyncPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }
}

/// Result of a successful attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The table doesn't exist on the source, so nothing was created or copied.
    Absent,
    /// The structure of `table` was applied and, if data sync is on, its rows were copied.
    Synced {
        table: TableName,
        transfer: Option<TransferStats>,
    },
}

/// Sync state of one table of a run.
#[derive(Debug, Clone)]
pub struct TableSyncUnit {
    table: TableRef,
    phase: TableSyncPhase,
    attempts: u32,
    last_error: Option<SyncError>,
    outcome: Option<AttemptOutcome>,
}

impl TableSyncUnit {
    pub fn new(table: TableRef) -> Self {
        Self {
            table,
            phase: TableSyncPhase::Pending,
            attempts: 0,
            last_error: None,
            outcome: None,
        }
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }

    pub fn phase(&self) -> TableSyncPhase {
        self.phase
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Returns the error of the most recent failed attempt, if any attempt failed.
    pub fn last_error(&self) -> Option<&SyncError> {
        self.last_error.as_ref()
    }

    pub fn outcome(&self) -> Option<&AttemptOutcome> {
        self.outcome.as_ref()
    }

    /// Starts a new attempt and returns its 1-based number.
    pub(crate) fn begin_attempt(&mut self) -> u32 {
        self.attempts += 1;
        self.phase = TableSyncPhase::Attempting;

        self.attempts
    }

    pub(crate) fn succeed(&mut self, outcome: AttemptOutcome) {
        self.phase = TableSyncPhase::Succeeded;
        self.outcome = Some(outcome);
    }

    pub(crate) fn retry(&mut self, error: SyncError) {
        self.phase = TableSyncPhase::Retrying;
        self.last_error = Some(error);
    }

    pub(crate) fn fail(&mut self, error: SyncError) {
        self.phase = TableSyncPhase::Failed;
        self.last_error = Some(error);
    }

    pub(crate) fn cancel(&mut self, error: SyncError) {
        self.phase = TableSyncPhase::Canceled;
        self.last_error = Some(error);
    }
}

/// Shared handle to the [`TableSyncUnit`] of a table being synced.
#[derive(Debug, Clone)]
pub struct TableSyncState {
    table: TableRef,
    inner: Arc<RwLock<TableSyncUnit>>,
}

impl TableSyncState {
    pub fn new(table: TableRef) -> Self {
        Self {
            inner: Arc::new(RwLock::new(TableSyncUnit::new(table.clone()))),
            table,
        }
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }

    /// Returns a copy of the current state of the table.
    pub async fn snapshot(&self) -> TableSyncUnit {
        self.inner.read().await.clone()
    }

    pub(crate) async fn update<R>(&self, f: impl FnOnce(&mut TableSyncUnit) -> R) -> R {
        let mut inner = self.inner.write().await;
        let previous_phase = inner.phase;
        let result = f(&mut *inner);

        if inner.phase != previous_phase {
            debug!(
                table = %self.table,
                "table phase changing from '{:?}' to '{:?}'",
                previous_phase, inner.phase
            );
        }

        result
    }
}

/// Everything a table sync needs besides the table itself, shared by all tables of a run.
#[derive(Debug)]
pub struct TableSyncContext<SC, TC, O, Z> {
    pub source: SC,
    pub target: TC,
    pub config: Arc<SyncConfig>,
    pub observer: Arc<O>,
    pub sleeper: Arc<Z>,
}

impl<SC, TC, O, Z> Clone for TableSyncContext<SC, TC, O, Z>
where
    SC: Clone,
    TC: Clone,
{
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            target: self.target.clone(),
            config: self.config.clone(),
            observer: self.observer.clone(),
            sleeper: self.sleeper.clone(),
        }
    }
}

/// Runs one attempt at syncing `table`: introspection, structure, and rows if data sync is on.
///
/// Fresh source and target clients are opened for the attempt and dropped when it ends, whatever
/// the outcome.
pub async fn sync_table_attempt<SC, TC, O, Z>(
    context: &TableSyncContext<SC, TC, O, Z>,
    table: &TableRef,
) -> SyncResult<AttemptOutcome>
where
    SC: Connector,
    SC::Client: SyncSource,
    TC: Connector,
    TC::Client: SyncTarget,
    O: SyncObserver,
{
    let source = context.source.connect().await?;
    let target = context.target.connect().await?;

    let Some(table_schema) = introspect_table(&source, table).await? else {
        return Ok(AttemptOutcome::Absent);
    };

    apply_table_structure(&target, &table_schema).await?;

    if !context.config.sync_data {
        return Ok(AttemptOutcome::Synced {
            table: table_schema.name,
            transfer: None,
        });
    }

    if context.config.validate_target_layout {
        validate_target_layout(&target, &table_schema).await?;
    }

    if context.config.truncate_before_copy {
        target.truncate_table(&table_schema.name).await?;
    }

    info!(table = %table, source_table = %table_schema.name, "copying table data");

    let stats = transfer_table_data(
        &source,
        &target,
        &table_schema.name,
        &context.config.transfer,
        context.observer.as_ref(),
    )
    .await?;

    Ok(AttemptOutcome::Synced {
        table: table_schema.name,
        transfer: Some(stats),
    })
}
