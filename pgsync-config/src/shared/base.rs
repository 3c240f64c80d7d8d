use thiserror::Error;

/// Configuration validation errors.
///
/// All of these are detected before any table is touched, they are never retried.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// TLS is enabled but no trusted root certificates are provided.
    #[error("Invalid TLS config: `trusted_root_certs` must be set when `enabled` is true")]
    MissingTrustedRootCerts,
    /// A connection descriptor is missing a required field.
    #[error("Invalid `{connection}` connection: `{field}` cannot be empty")]
    EmptyConnectionField {
        connection: &'static str,
        field: &'static str,
    },
    /// A connection descriptor has port zero.
    #[error("Invalid `{0}` connection: `port` cannot be zero")]
    ZeroPort(&'static str),
    /// Maximum table sync workers cannot be zero.
    #[error("`max_table_sync_workers` cannot be zero")]
    MaxTableSyncWorkersZero,
    /// The retry policy must allow at least one attempt.
    #[error("`retry.max_attempts` cannot be zero")]
    MaxAttemptsZero,
    /// The transfer chunk size cannot be zero.
    #[error("`transfer.chunk_size_bytes` cannot be zero")]
    ChunkSizeZero,
    /// The progress threshold cannot be zero.
    #[error("`transfer.progress_threshold_bytes` cannot be zero")]
    ProgressThresholdZero,
    /// A configured table name is blank.
    #[error("`tables_to_sync` contains a blank table name at position {0}")]
    BlankTableName(usize),
    /// A configured schema name is blank.
    #[error("`schemas_to_sync` contains a blank schema name at position {0}")]
    BlankSchemaName(usize),
}
