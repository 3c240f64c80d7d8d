use tracing::{debug, error};

use crate::error::SyncResult;
use crate::sync::table::{TableSyncState, TableSyncUnit};
use crate::workers::base::{Worker, WorkerHandle};
use crate::workers::table_sync::TableSyncWorkerHandle;

/// Pool of the table sync workers of a run.
///
/// Workers are kept in the order they were started, which is the order of the report.
#[derive(Debug, Default)]
pub struct TableSyncWorkerPool {
    workers: Vec<TableSyncWorkerHandle>,
}

impl TableSyncWorkerPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts `worker` and adds it to the pool.
    pub async fn start_worker<W>(&mut self, worker: W) -> SyncResult<()>
    where
        W: Worker<TableSyncWorkerHandle, TableSyncState, Error = crate::error::SyncError>,
    {
        let handle = worker.start().await?;

        debug!(
            "successfully added worker for table {} to the pool",
            handle.state().table()
        );

        self.workers.push(handle);

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Waits for every worker to finish and returns the final state of each table.
    ///
    /// A worker that died before its table reached a terminal phase leaves the table failed.
    pub async fn wait_all(self) -> Vec<TableSyncUnit> {
        let mut units = Vec::with_capacity(self.workers.len());

        for worker in self.workers {
            let state = worker.state();
            if let Err(err) = worker.wait().await {
                error!("table sync worker for table {} failed: {err}", state.table());

                state.update(|unit| unit.fail(err)).await;
            }

            units.push(state.snapshot().await);
        }

        units
    }
}
