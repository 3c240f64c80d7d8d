use serde::{Deserialize, Serialize};

use crate::Config;
use crate::shared::{PgConnectionConfig, SyncConfig, ValidationError};

/// Configuration of the sync service.
///
/// Aggregates both connection descriptors and the sync settings. It is loaded once, validated,
/// and then shared read-only with every table worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SyncServiceConfig {
    /// The database tables are read from.
    pub source: PgConnectionConfig,
    /// The database tables are created in and copied into.
    pub target: PgConnectionConfig,
    /// What to sync and how.
    #[serde(default)]
    pub sync: SyncConfig,
}

impl SyncServiceConfig {
    /// Validates the complete service configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.source.validate("source")?;
        self.target.validate("target")?;
        self.sync.validate()
    }
}

impl Config for SyncServiceConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] =
        &["sync.tables_to_sync", "sync.schemas_to_sync"];
}
