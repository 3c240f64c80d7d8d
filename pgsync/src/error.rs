use std::error;
use std::fmt;

use pgsync_config::shared::ValidationError;

/// Convenient result type for sync operations using [`SyncError`] as the error type.
pub type SyncResult<T> = Result<T, SyncError>;

/// Main error type for sync operations.
///
/// A [`SyncError`] is either a single error made of an [`ErrorKind`], a static description and an
/// optional dynamic detail, or an aggregate of multiple errors.
#[derive(Debug, Clone)]
pub struct SyncError {
    repr: ErrorRepr,
}

/// Internal representation of error data.
#[derive(Debug, Clone)]
enum ErrorRepr {
    /// Error with kind and static description
    WithDescription(ErrorKind, &'static str),
    /// Error with kind, static description, and dynamic detail
    WithDescriptionAndDetail(ErrorKind, &'static str, String),
    /// Multiple aggregated errors
    Many(Vec<SyncError>),
}

/// Categories of errors that can occur while syncing tables.
///
/// The kind decides whether a table attempt is retried, see [`SyncError::is_retryable`].
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    // Connection Errors
    ConnectionFailed,
    AuthenticationError,
    TlsError,

    // Query & Transfer Errors
    QueryFailed,
    CopyFailed,
    IoError,

    // Schema Errors
    SourceSchemaError,
    SchemaMismatch,

    // Data Errors
    ConstraintViolation,
    ConversionError,

    // Security Errors
    PermissionDenied,

    // Configuration Errors
    ConfigError,

    // Workflow Errors
    TableSyncWorkerPanic,
    OperationCanceled,

    // Unknown / Uncategorized
    Unknown,
}

impl SyncError {
    /// Creates a [`SyncError`] containing multiple aggregated errors.
    pub fn many(errors: Vec<SyncError>) -> SyncError {
        SyncError {
            repr: ErrorRepr::Many(errors),
        }
    }

    /// Returns the [`ErrorKind`] of this error.
    ///
    /// For multiple errors, returns the kind of the first error or [`ErrorKind::Unknown`]
    /// if the error list is empty.
    pub fn kind(&self) -> ErrorKind {
        match self.repr {
            ErrorRepr::WithDescription(kind, _)
            | ErrorRepr::WithDescriptionAndDetail(kind, _, _) => kind,
            ErrorRepr::Many(ref errors) => errors
                .first()
                .map(|err| err.kind())
                .unwrap_or(ErrorKind::Unknown),
        }
    }

    /// Returns all [`ErrorKind`]s present in this error.
    pub fn kinds(&self) -> Vec<ErrorKind> {
        match self.repr {
            ErrorRepr::WithDescription(kind, _)
            | ErrorRepr::WithDescriptionAndDetail(kind, _, _) => vec![kind],
            ErrorRepr::Many(ref errors) => errors
                .iter()
                .flat_map(|err| err.kinds())
                .collect::<Vec<_>>(),
        }
    }

    /// Returns the detailed error information if available.
    ///
    /// For multiple errors, returns the detail of the first error that has one.
    pub fn detail(&self) -> Option<&str> {
        match self.repr {
            ErrorRepr::WithDescriptionAndDetail(_, _, ref detail) => Some(detail.as_str()),
            ErrorRepr::Many(ref errors) => errors.iter().find_map(|e| e.detail()),
            _ => None,
        }
    }

    /// Returns `true` when a table attempt that failed with this error may be tried again.
    ///
    /// Cancellation and configuration errors end a table immediately, every other kind is
    /// considered transient. An aggregate is retryable only if all of its errors are.
    pub fn is_retryable(&self) -> bool {
        self.kinds()
            .iter()
            .all(|kind| !matches!(kind, ErrorKind::OperationCanceled | ErrorKind::ConfigError))
    }
}

impl PartialEq for SyncError {
    fn eq(&self, other: &SyncError) -> bool {
        match (&self.repr, &other.repr) {
            (ErrorRepr::WithDescription(kind_a, _), ErrorRepr::WithDescription(kind_b, _)) => {
                kind_a == kind_b
            }
            (
                ErrorRepr::WithDescriptionAndDetail(kind_a, _, _),
                ErrorRepr::WithDescriptionAndDetail(kind_b, _, _),
            ) => kind_a == kind_b,
            (ErrorRepr::Many(errors_a), ErrorRepr::Many(errors_b)) => {
                errors_a.len() == errors_b.len()
                    && errors_a.iter().zip(errors_b.iter()).all(|(a, b)| a == b)
            }
            _ => false,
        }
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self.repr {
            ErrorRepr::WithDescription(kind, desc) => {
                fmt::Debug::fmt(&kind, f)?;
                f.write_str(": ")?;
                desc.fmt(f)?;

                Ok(())
            }
            ErrorRepr::WithDescriptionAndDetail(kind, desc, ref detail) => {
                fmt::Debug::fmt(&kind, f)?;
                f.write_str(": ")?;
                desc.fmt(f)?;
                f.write_str(" -> ")?;
                detail.fmt(f)?;

                Ok(())
            }
            ErrorRepr::Many(ref errors) => {
                if errors.is_empty() {
                    write!(f, "Multiple errors occurred (empty)")?;
                } else if errors.len() == 1 {
                    errors[0].fmt(f)?;
                } else {
                    write!(f, "Multiple errors occurred ({} total):", errors.len())?;
                    for (i, error) in errors.iter().enumerate() {
                        write!(f, "\n  {}: {}", i + 1, error)?;
                    }
                }
                Ok(())
            }
        }
    }
}

impl error::Error for SyncError {}

/// Creates a [`SyncError`] from an error kind and static description.
impl From<(ErrorKind, &'static str)> for SyncError {
    fn from((kind, desc): (ErrorKind, &'static str)) -> SyncError {
        SyncError {
            repr: ErrorRepr::WithDescription(kind, desc),
        }
    }
}

/// Creates a [`SyncError`] from an error kind, static description, and dynamic detail.
impl From<(ErrorKind, &'static str, String)> for SyncError {
    fn from((kind, desc, detail): (ErrorKind, &'static str, String)) -> SyncError {
        SyncError {
            repr: ErrorRepr::WithDescriptionAndDetail(kind, desc, detail),
        }
    }
}

/// Converts [`std::io::Error`] to [`SyncError`] with [`ErrorKind::IoError`].
impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> SyncError {
        SyncError {
            repr: ErrorRepr::WithDescriptionAndDetail(
                ErrorKind::IoError,
                "I/O error occurred",
                err.to_string(),
            ),
        }
    }
}

/// Converts [`ValidationError`] to [`SyncError`] with [`ErrorKind::ConfigError`].
impl From<ValidationError> for SyncError {
    fn from(err: ValidationError) -> SyncError {
        SyncError {
            repr: ErrorRepr::WithDescriptionAndDetail(
                ErrorKind::ConfigError,
                "Invalid sync configuration",
                err.to_string(),
            ),
        }
    }
}

/// Converts [`tokio_postgres::Error`] to [`SyncError`] with an error kind derived from the
/// SQLSTATE code of the error.
///
/// Errors without a SQLSTATE code originate from the connection itself.
impl From<tokio_postgres::Error> for SyncError {
    fn from(err: tokio_postgres::Error) -> SyncError {
        let (kind, description) = match err.code() {
            Some(sqlstate) => {
                use tokio_postgres::error::SqlState;

                match *sqlstate {
                    // Connection errors (08xxx)
                    SqlState::CONNECTION_EXCEPTION
                    | SqlState::CONNECTION_DOES_NOT_EXIST
                    | SqlState::CONNECTION_FAILURE
                    | SqlState::SQLCLIENT_UNABLE_TO_ESTABLISH_SQLCONNECTION
                    | SqlState::SQLSERVER_REJECTED_ESTABLISHMENT_OF_SQLCONNECTION => (
                        ErrorKind::ConnectionFailed,
                        "PostgreSQL connection error",
                    ),

                    // Authentication errors (28xxx)
                    SqlState::INVALID_AUTHORIZATION_SPECIFICATION | SqlState::INVALID_PASSWORD => (
                        ErrorKind::AuthenticationError,
                        "PostgreSQL authentication failed",
                    ),

                    // Data integrity violations (23xxx)
                    SqlState::INTEGRITY_CONSTRAINT_VIOLATION
                    | SqlState::NOT_NULL_VIOLATION
                    | SqlState::FOREIGN_KEY_VIOLATION
                    | SqlState::UNIQUE_VIOLATION
                    | SqlState::CHECK_VIOLATION
                    | SqlState::EXCLUSION_VIOLATION => (
                        ErrorKind::ConstraintViolation,
                        "PostgreSQL constraint violation",
                    ),

                    // Data conversion errors (22xxx)
                    SqlState::DATA_EXCEPTION
                    | SqlState::INVALID_TEXT_REPRESENTATION
                    | SqlState::INVALID_BINARY_REPRESENTATION
                    | SqlState::STRING_DATA_RIGHT_TRUNCATION
                    | SqlState::NUMERIC_VALUE_OUT_OF_RANGE
                    | SqlState::BAD_COPY_FILE_FORMAT => (
                        ErrorKind::ConversionError,
                        "PostgreSQL data conversion error",
                    ),

                    // Schema/object not found errors (42xxx)
                    SqlState::UNDEFINED_TABLE
                    | SqlState::UNDEFINED_COLUMN
                    | SqlState::UNDEFINED_OBJECT
                    | SqlState::UNDEFINED_SCHEMA => (
                        ErrorKind::SourceSchemaError,
                        "PostgreSQL schema object not found",
                    ),

                    // Access errors (42xxx)
                    SqlState::INSUFFICIENT_PRIVILEGE => (
                        ErrorKind::PermissionDenied,
                        "PostgreSQL permission denied",
                    ),

                    // Syntax errors (42xxx)
                    SqlState::SYNTAX_ERROR
                    | SqlState::SYNTAX_ERROR_OR_ACCESS_RULE_VIOLATION
                    | SqlState::DATATYPE_MISMATCH
                    | SqlState::WRONG_OBJECT_TYPE => (
                        ErrorKind::QueryFailed,
                        "PostgreSQL syntax or semantic error",
                    ),

                    // Resource errors (53xxx)
                    SqlState::INSUFFICIENT_RESOURCES
                    | SqlState::OUT_OF_MEMORY
                    | SqlState::TOO_MANY_CONNECTIONS => (
                        ErrorKind::ConnectionFailed,
                        "PostgreSQL resource limitation",
                    ),
                    SqlState::DISK_FULL => (ErrorKind::IoError, "PostgreSQL disk full"),

                    // Operator intervention errors (57xxx)
                    SqlState::QUERY_CANCELED => {
                        (ErrorKind::QueryFailed, "PostgreSQL query canceled")
                    }
                    SqlState::ADMIN_SHUTDOWN
                    | SqlState::CRASH_SHUTDOWN
                    | SqlState::CANNOT_CONNECT_NOW
                    | SqlState::IDLE_SESSION_TIMEOUT => (
                        ErrorKind::ConnectionFailed,
                        "PostgreSQL server unavailable",
                    ),

                    // Transaction errors (40xxx)
                    SqlState::T_R_SERIALIZATION_FAILURE | SqlState::T_R_DEADLOCK_DETECTED => {
                        (ErrorKind::QueryFailed, "PostgreSQL transaction rollback")
                    }

                    // System errors (58xxx, XXxxx)
                    SqlState::IO_ERROR | SqlState::DATA_CORRUPTED | SqlState::INDEX_CORRUPTED => {
                        (ErrorKind::IoError, "PostgreSQL I/O error")
                    }
                    SqlState::SYSTEM_ERROR | SqlState::INTERNAL_ERROR => {
                        (ErrorKind::QueryFailed, "PostgreSQL system error")
                    }

                    // Default for other SQL states
                    _ => (ErrorKind::QueryFailed, "PostgreSQL error"),
                }
            }
            None => (ErrorKind::ConnectionFailed, "PostgreSQL connection failed"),
        };

        SyncError {
            repr: ErrorRepr::WithDescriptionAndDetail(kind, description, err.to_string()),
        }
    }
}

/// Converts [`rustls::Error`] to [`SyncError`] with [`ErrorKind::TlsError`].
impl From<rustls::Error> for SyncError {
    fn from(err: rustls::Error) -> SyncError {
        SyncError {
            repr: ErrorRepr::WithDescriptionAndDetail(
                ErrorKind::TlsError,
                "TLS configuration failed",
                err.to_string(),
            ),
        }
    }
}
