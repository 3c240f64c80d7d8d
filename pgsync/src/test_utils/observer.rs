use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::ErrorKind;
use crate::observer::SyncObserver;
use crate::schema::{TableName, TableRef};
use crate::sync::report::SyncReport;

/// An event observed during a sync run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    Started {
        table: TableRef,
        attempt: u32,
    },
    Done {
        table: TableRef,
        attempt: u32,
    },
    Absent {
        table: TableRef,
    },
    Retrying {
        table: TableRef,
        attempt: u32,
        delay: Duration,
        kind: ErrorKind,
    },
    Failed {
        table: TableRef,
        attempts: u32,
        kind: ErrorKind,
    },
    Canceled {
        table: TableRef,
    },
    Progress {
        table: TableName,
        megabytes: u64,
    },
    TransferCompleted {
        table: TableName,
        bytes: u64,
        rows: u64,
    },
    RunCompleted {
        tables: usize,
    },
}

/// A [`SyncObserver`] keeping every event in memory.
///
/// Clones share the recorded events, so a clone can be handed to a pipeline and inspected once the
/// run is over.
#[derive(Debug, Clone, Default)]
pub struct RecordingObserver {
    events: Arc<Mutex<Vec<SyncEvent>>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SyncEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Returns the events concerning `table`, in the order they were emitted.
    pub fn table_events(&self, table: &TableRef) -> Vec<SyncEvent> {
        self.events()
            .into_iter()
            .filter(|event| match event {
                SyncEvent::Started { table: t, .. }
                | SyncEvent::Done { table: t, .. }
                | SyncEvent::Absent { table: t }
                | SyncEvent::Retrying { table: t, .. }
                | SyncEvent::Failed { table: t, .. }
                | SyncEvent::Canceled { table: t } => t == table,
                _ => false,
            })
            .collect()
    }

    pub fn retries(&self) -> Vec<SyncEvent> {
        self.events()
            .into_iter()
            .filter(|event| matches!(event, SyncEvent::Retrying { .. }))
            .collect()
    }

    /// Returns the megabyte counts of every progress event of `table`.
    pub fn progress(&self, table: &TableName) -> Vec<u64> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SyncEvent::Progress { table: t, megabytes } if &t == table => Some(megabytes),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: SyncEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl SyncObserver for RecordingObserver {
    fn table_started(&self, table: &TableRef, attempt: u32) {
        self.push(SyncEvent::Started {
            table: table.clone(),
            attempt,
        });
    }

    fn table_done(&self, table: &TableRef, attempt: u32) {
        self.push(SyncEvent::Done {
            table: table.clone(),
            attempt,
        });
    }

    fn table_absent(&self, table: &TableRef) {
        self.push(SyncEvent::Absent {
            table: table.clone(),
        });
    }

    fn table_retrying(
        &self,
        table: &TableRef,
        attempt: u32,
        delay: Duration,
        error: &crate::error::SyncError,
    ) {
        self.push(SyncEvent::Retrying {
            table: table.clone(),
            attempt,
            delay,
            kind: error.kind(),
        });
    }

    fn table_failed(&self, table: &TableRef, attempts: u32, error: &crate::error::SyncError) {
        self.push(SyncEvent::Failed {
            table: table.clone(),
            attempts,
            kind: error.kind(),
        });
    }

    fn table_canceled(&self, table: &TableRef) {
        self.push(SyncEvent::Canceled {
            table: table.clone(),
        });
    }

    fn transfer_progress(&self, table: &TableName, megabytes: u64) {
        self.push(SyncEvent::Progress {
            table: table.clone(),
            megabytes,
        });
    }

    fn transfer_completed(&self, table: &TableName, bytes: u64, rows: u64) {
        self.push(SyncEvent::TransferCompleted {
            table: table.clone(),
            bytes,
            rows,
        });
    }

    fn run_completed(&self, report: &SyncReport) {
        self.push(SyncEvent::RunCompleted {
            tables: report.tables().len(),
        });
    }
}
