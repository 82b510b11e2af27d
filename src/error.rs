//! Error taxonomy for audit operations.
//!
//! Only failures that must be told apart by callers get their own variant.
//! A single-file scan failure is not an error at all: it is absorbed into
//! the commit audit as a skipped file (see `audit::FileScanOutcome`).
//! "Fewer than two commits in a window" is likewise a status, not an error.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuditError {
    /// Missing credentials or invalid configuration. Fatal, never retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Network/API failure while fetching commits or trees. Retried a
    /// bounded number of times at the handler boundary.
    #[error("connector error: {0}")]
    Connector(String),

    /// A whole-commit or whole-repository analysis failure.
    #[error("analysis error: {0}")]
    Analysis(String),

    /// Persistence failure.
    #[error("store error: {0}")]
    Store(String),
}

impl From<git2::Error> for AuditError {
    fn from(err: git2::Error) -> Self {
        AuditError::Connector(err.to_string())
    }
}

impl From<redb::Error> for AuditError {
    fn from(err: redb::Error) -> Self {
        AuditError::Store(err.to_string())
    }
}

// redb surfaces a distinct error type per operation; they all mean the
// same thing to callers here.
macro_rules! redb_store_error {
    ($($ty:ty),+ $(,)?) => {
        $(impl From<$ty> for AuditError {
            fn from(err: $ty) -> Self {
                AuditError::Store(err.to_string())
            }
        })+
    };
}

redb_store_error!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);

impl From<serde_json::Error> for AuditError {
    fn from(err: serde_json::Error) -> Self {
        AuditError::Store(format!("document encoding: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, AuditError>;
