use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info};

use crate::clients::base::{Connector, SyncSource, SyncTarget};
use crate::concurrency::shutdown::{ShutdownRx, wait_for_shutdown};
use crate::error::{ErrorKind, SyncError, SyncResult};
use crate::observer::SyncObserver;
use crate::schema::TableRef;
use crate::sync::retry::{Sleeper, canceled_error, run_table_sync};
use crate::sync::table::{TableSyncContext, TableSyncState};
use crate::sync_error;
use crate::workers::base::{Worker, WorkerHandle};

#[derive(Debug)]
pub struct TableSyncWorkerHandle {
    state: TableSyncState,
    handle: Option<JoinHandle<()>>,
}

impl WorkerHandle<TableSyncState> for TableSyncWorkerHandle {
    fn state(&self) -> TableSyncState {
        self.state.clone()
    }

    async fn wait(mut self) -> SyncResult<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        handle.await.map_err(|err| {
            sync_error!(
                ErrorKind::TableSyncWorkerPanic,
                "A table sync worker panicked",
                err
            )
        })?;

        Ok(())
    }
}

/// Worker syncing a single table.
///
/// The worker waits for one of the run's permits before its first attempt and holds it until the
/// table reaches a terminal phase, so that at most as many tables as there are permits have
/// connections open at the same time.
#[derive(Debug)]
pub struct TableSyncWorker<SC, TC, O, Z> {
    context: TableSyncContext<SC, TC, O, Z>,
    table: TableRef,
    shutdown_rx: ShutdownRx,
    run_permit: Arc<Semaphore>,
}

impl<SC, TC, O, Z> TableSyncWorker<SC, TC, O, Z> {
    pub fn new(
        context: TableSyncContext<SC, TC, O, Z>,
        table: TableRef,
        shutdown_rx: ShutdownRx,
        run_permit: Arc<Semaphore>,
    ) -> Self {
        Self {
            context,
            table,
            shutdown_rx,
            run_permit,
        }
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }
}

impl<SC, TC, O, Z> Worker<TableSyncWorkerHandle, TableSyncState> for TableSyncWorker<SC, TC, O, Z>
where
    SC: Connector,
    SC::Client: SyncSource,
    TC: Connector,
    TC::Client: SyncTarget,
    O: SyncObserver,
    Z: Sleeper,
{
    type Error = SyncError;

    async fn start(mut self) -> SyncResult<TableSyncWorkerHandle> {
        info!("starting table sync worker for table {}", self.table);

        let state = TableSyncState::new(self.table.clone());

        let state_clone = state.clone();
        let table_sync_worker_span =
            tracing::info_span!("table_sync_worker", table = %self.table);
        let table_sync_worker = async move {
            debug!(
                "waiting to acquire a running permit for table sync worker for table {}",
                self.table
            );

            let permit = tokio::select! {
                biased;

                _ = wait_for_shutdown(&mut self.shutdown_rx) => {
                    info!(
                        "shutting down table sync worker for table {} while waiting for a run permit",
                        self.table
                    );

                    state_clone.update(|unit| unit.cancel(canceled_error())).await;
                    self.context.observer.table_canceled(&self.table);

                    return;
                }

                permit = self.run_permit.acquire() => permit,
            };

            let permit = match permit {
                Ok(permit) => permit,
                Err(err) => {
                    let err = sync_error!(
                        ErrorKind::Unknown,
                        "Failed to acquire a permit to run a table sync worker",
                        err
                    );
                    error!("table sync worker for table {} could not start: {err}", self.table);

                    self.context.observer.table_failed(&self.table, 0, &err);
                    state_clone.update(|unit| unit.fail(err)).await;

                    return;
                }
            };

            debug!(
                "acquired running permit for table sync worker for table {}",
                self.table
            );

            run_table_sync(&self.context, &state_clone, &mut self.shutdown_rx).await;

            // The permit bounds the number of tables with open connections, so it's held until
            // the table is done.
            drop(permit);

            info!("table sync worker for table {} completed", self.table);
        }
        .instrument(table_sync_worker_span);

        let handle = tokio::spawn(table_sync_worker);

        Ok(TableSyncWorkerHandle {
            state,
            handle: Some(handle),
        })
    }
}
