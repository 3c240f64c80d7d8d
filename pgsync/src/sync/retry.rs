use std::future::Future;
use std::time::Duration;
use tracing::info;

use crate::clients::base::{Connector, SyncSource, SyncTarget};
use crate::concurrency::shutdown::{ShutdownRx, wait_for_shutdown};
use crate::error::{ErrorKind, SyncError};
use crate::observer::SyncObserver;
use crate::sync::table::{AttemptOutcome, TableSyncContext, TableSyncState, sync_table_attempt};
use crate::sync_error;

/// Waits between two attempts of a table.
pub trait Sleeper: Send + Sync + 'static {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

/// [`Sleeper`] backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await
    }
}

pub(crate) fn canceled_error() -> SyncError {
    sync_error!(
        ErrorKind::OperationCanceled,
        "Table sync was canceled by a shutdown"
    )
}

/// Syncs the table of `state` until it reaches a terminal phase.
///
/// Every attempt reruns the whole sequence from introspection on. A failed attempt is retried after
/// `retry.backoff(attempt)` while attempts remain and the error is retryable. A shutdown stops the
/// running attempt or the wait for the next one and leaves the table canceled.
pub async fn run_table_sync<SC, TC, O, Z>(
    context: &TableSyncContext<SC, TC, O, Z>,
    state: &TableSyncState,
    shutdown_rx: &mut ShutdownRx,
) where
    SC: Connector,
    SC::Client: SyncSource,
    TC: Connector,
    TC::Client: SyncTarget,
    O: SyncObserver,
    Z: Sleeper,
{
    let table = state.table();
    let max_attempts = context.config.retry.max_attempts.max(1);

    loop {
        let attempt = state.update(|unit| unit.begin_attempt()).await;
        context.observer.table_started(table, attempt);

        let result = tokio::select! {
            biased;

            _ = wait_for_shutdown(shutdown_rx) => Err(canceled_error()),

            result = sync_table_attempt(context, table) => result,
        };

        let err = match result {
            Ok(outcome) => {
                let absent = outcome == AttemptOutcome::Absent;
                state.update(|unit| unit.succeed(outcome)).await;

                if absent {
                    context.observer.table_absent(table);
                }
                context.observer.table_done(table, attempt);

                return;
            }
            Err(err) => err,
        };

        if err.kind() == ErrorKind::OperationCanceled {
            info!(table = %table, attempt, "shutdown signal received, stopping table sync");

            state.update(|unit| unit.cancel(err)).await;
            context.observer.table_canceled(table);

            return;
        }

        if !err.is_retryable() || attempt >= max_attempts {
            context.observer.table_failed(table, attempt, &err);
            state.update(|unit| unit.fail(err)).await;

            return;
        }

        let delay = context.config.retry.backoff(attempt);
        context
            .observer
            .table_retrying(table, attempt, delay, &err);
        state.update(|unit| unit.retry(err)).await;

        tokio::select! {
            biased;

            _ = wait_for_shutdown(shutdown_rx) => {
                info!(table = %table, "shutdown signal received while waiting to retry");

                state.update(|unit| unit.cancel(canceled_error())).await;
                context.observer.table_canceled(table);

                return;
            }

            _ = context.sleeper.sleep(delay) => {}
        }
    }
}
