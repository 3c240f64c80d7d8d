//! Observation of a sync run.
//!
//! The sync engine reports what happens to every table through a [`SyncObserver`] instead of
//! logging directly, so that callers decide where the events go. [`TracingObserver`] turns them
//! into `tracing` events.

use std::time::Duration;
use tracing::{error, info, warn};

use crate::error::SyncError;
use crate::schema::{TableName, TableRef};
use crate::sync::report::SyncReport;

/// Receives the events of a sync run.
///
/// Events are emitted concurrently from the workers of different tables.
pub trait SyncObserver: Send + Sync + 'static {
    /// An attempt for `table` is starting. `attempt` is 1-based.
    fn table_started(&self, table: &TableRef, attempt: u32);

    /// `table` was synced by the given attempt.
    fn table_done(&self, table: &TableRef, attempt: u32);

    /// `table` doesn't exist on the source, nothing was created or copied.
    fn table_absent(&self, table: &TableRef);

    /// An attempt for `table` failed and the table is retried after `delay`.
    fn table_retrying(&self, table: &TableRef, attempt: u32, delay: Duration, error: &SyncError);

    /// `table` failed for good after `attempts` attempts.
    fn table_failed(&self, table: &TableRef, attempts: u32, error: &SyncError);

    /// `table` was stopped by a shutdown.
    fn table_canceled(&self, table: &TableRef);

    /// Another `progress_threshold_bytes` of `table` were copied, `megabytes` in total so far.
    fn transfer_progress(&self, table: &TableName, megabytes: u64);

    /// The copy into `table` was committed on the target.
    fn transfer_completed(&self, table: &TableName, bytes: u64, rows: u64);

    /// Every table of the run reached a terminal phase.
    fn run_completed(&self, report: &SyncReport);
}

/// Emits the events of a sync run as `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl SyncObserver for TracingObserver {
    fn table_started(&self, table: &TableRef, attempt: u32) {
        info!(table = %table, attempt, "[START] {table}");
    }

    fn table_done(&self, table: &TableRef, attempt: u32) {
        info!(table = %table, attempt, "[DONE] {table}");
    }

    fn table_absent(&self, table: &TableRef) {
        info!(table = %table, "table {table} does not exist on the source, skipping it");
    }

    fn table_retrying(&self, table: &TableRef, attempt: u32, delay: Duration, error: &SyncError) {
        warn!(
            table = %table,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "retry {table} due to: {error}"
        );
    }

    fn table_failed(&self, table: &TableRef, attempts: u32, error: &SyncError) {
        error!(
            table = %table,
            attempts,
            error = %error,
            "sync of {table} failed after {attempts} attempts: {error}"
        );
    }

    fn table_canceled(&self, table: &TableRef) {
        warn!(table = %table, "sync of {table} was canceled");
    }

    fn transfer_progress(&self, table: &TableName, megabytes: u64) {
        info!(table = %table, megabytes, "copied {megabytes} MB of {table}");
    }

    fn transfer_completed(&self, table: &TableName, bytes: u64, rows: u64) {
        info!(table = %table, bytes, rows, "binary copy of {table} complete");
    }

    fn run_completed(&self, report: &SyncReport) {
        info!(
            tables = report.tables().len(),
            succeeded = report.succeeded().len(),
            failed = report.failed().len(),
            canceled = report.canceled().len(),
            "sync run completed"
        );
    }
}
