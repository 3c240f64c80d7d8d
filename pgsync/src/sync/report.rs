use crate::error::{SyncError, SyncResult};
use crate::schema::TableRef;
use crate::sync::table::{TableSyncPhase, TableSyncUnit};

/// Final state of every table of a sync run, in the order the tables were configured.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    tables: Vec<TableSyncUnit>,
}

impl SyncReport {
    pub fn new(tables: Vec<TableSyncUnit>) -> Self {
        Self { tables }
    }

    pub fn tables(&self) -> &[TableSyncUnit] {
        &self.tables
    }

    pub fn table(&self, table: &TableRef) -> Option<&TableSyncUnit> {
        self.tables.iter().find(|unit| unit.table() == table)
    }

    pub fn succeeded(&self) -> Vec<&TableSyncUnit> {
        self.with_phase(TableSyncPhase::Succeeded)
    }

    pub fn failed(&self) -> Vec<&TableSyncUnit> {
        self.with_phase(TableSyncPhase::Failed)
    }

    pub fn canceled(&self) -> Vec<&TableSyncUnit> {
        self.with_phase(TableSyncPhase::Canceled)
    }

    /// Returns `true` if no table failed or was canceled.
    pub fn is_success(&self) -> bool {
        self.tables
            .iter()
            .all(|unit| unit.phase() == TableSyncPhase::Succeeded)
    }

    /// Returns the errors of every failed or canceled table as one error, in report order.
    pub fn result(&self) -> SyncResult<()> {
        if self.is_success() {
            return Ok(());
        }

        let errors = self
            .tables
            .iter()
            .filter(|unit| unit.phase() != TableSyncPhase::Succeeded)
            .filter_map(|unit| unit.last_error().cloned())
            .collect();

        Err(SyncError::many(errors))
    }

    fn with_phase(&self, phase: TableSyncPhase) -> Vec<&TableSyncUnit> {
        self.tables
            .iter()
            .filter(|unit| unit.phase() == phase)
            .collect()
    }
}
