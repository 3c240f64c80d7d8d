use serde::{Deserialize, Serialize};

use crate::shared::{RetryConfig, ValidationError};

/// Default ceiling on the number of tables synced concurrently.
pub const DEFAULT_MAX_TABLE_SYNC_WORKERS: u16 = 4;

/// Default size of a single chunk relayed from the export to the import channel.
pub const DEFAULT_CHUNK_SIZE_BYTES: usize = 64 * 1024;

/// Default number of bytes between two progress observations.
pub const DEFAULT_PROGRESS_THRESHOLD_BYTES: u64 = 50 * 1024 * 1024;

/// Settings of a sync run: which tables, whether rows are copied, and how hard to try.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Tables to sync, either `schema.table` or an unqualified `table`.
    #[serde(default)]
    pub tables_to_sync: Vec<String>,
    /// Schemas whose base tables are all synced in addition to `tables_to_sync`.
    #[serde(default)]
    pub schemas_to_sync: Vec<String>,
    /// Whether row data is copied after the table structure is created.
    #[serde(default)]
    pub sync_data: bool,
    /// Maximum number of tables synced at the same time.
    #[serde(default = "default_max_table_sync_workers")]
    pub max_table_sync_workers: u16,
    /// Truncates the target table before copying rows into it.
    #[serde(default)]
    pub truncate_before_copy: bool,
    /// Compares the target table layout with the source before copying rows into it.
    #[serde(default)]
    pub validate_target_layout: bool,
    /// Per-table retry policy.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Bulk transfer tuning.
    #[serde(default)]
    pub transfer: TransferConfig,
}

impl SyncConfig {
    /// Validates the sync settings.
    ///
    /// An empty table list is valid and results in a run with no work.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_table_sync_workers == 0 {
            return Err(ValidationError::MaxTableSyncWorkersZero);
        }

        if self.retry.max_attempts == 0 {
            return Err(ValidationError::MaxAttemptsZero);
        }

        self.transfer.validate()?;

        if let Some(position) = self.tables_to_sync.iter().position(|t| t.trim().is_empty()) {
            return Err(ValidationError::BlankTableName(position));
        }

        if let Some(position) = self.schemas_to_sync.iter().position(|s| s.trim().is_empty()) {
            return Err(ValidationError::BlankSchemaName(position));
        }

        Ok(())
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            tables_to_sync: Vec::new(),
            schemas_to_sync: Vec::new(),
            sync_data: false,
            max_table_sync_workers: DEFAULT_MAX_TABLE_SYNC_WORKERS,
            truncate_before_copy: false,
            validate_target_layout: false,
            retry: RetryConfig::default(),
            transfer: TransferConfig::default(),
        }
    }
}

fn default_max_table_sync_workers() -> u16 {
    DEFAULT_MAX_TABLE_SYNC_WORKERS
}

/// Tuning of the binary bulk transfer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Upper bound on the size of a chunk written to the import channel.
    #[serde(default = "default_chunk_size_bytes")]
    pub chunk_size_bytes: usize,
    /// Number of bytes after which a progress observation is emitted.
    #[serde(default = "default_progress_threshold_bytes")]
    pub progress_threshold_bytes: u64,
}

impl TransferConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.chunk_size_bytes == 0 {
            return Err(ValidationError::ChunkSizeZero);
        }

        if self.progress_threshold_bytes == 0 {
            return Err(ValidationError::ProgressThresholdZero);
        }

        Ok(())
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size_bytes: default_chunk_size_bytes(),
            progress_threshold_bytes: default_progress_threshold_bytes(),
        }
    }
}

fn default_chunk_size_bytes() -> usize {
    DEFAULT_CHUNK_SIZE_BYTES
}

fn default_progress_threshold_bytes() -> u64 {
    DEFAULT_PROGRESS_THRESHOLD_BYTES
}
