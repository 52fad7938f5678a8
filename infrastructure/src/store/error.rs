//! Storage error types

use quorum_gate_application::ports::consensus_store::StoreError;
use rusqlite::ErrorCode;
use thiserror::Error;

/// Result type alias for storage operations
pub type Result<T> = std::result::Result<T, DbError>;

/// Errors raised inside the SQLite adapter
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Pool could not be built or its pragmas were not applied
    #[error("Connection pool error: {0}")]
    Pool(String),

    /// No pooled connection became free in time
    #[error("Connection pool exhausted: {0}")]
    PoolExhausted(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Round not found: {0}")]
    NotFound(String),

    /// A stored value could not be decoded into its domain type
    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error("Blocking task failed: {0}")]
    Join(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DbError {
    /// Lock contention that a later attempt may not hit.
    pub fn is_busy(&self) -> bool {
        match self {
            DbError::Sqlite(e) => matches!(
                e.sqlite_error_code(),
                Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
            ),
            DbError::PoolExhausted(_) => true,
            _ => false,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        if err.is_busy() {
            return StoreError::Busy(err.to_string());
        }
        match err {
            DbError::NotFound(id) => StoreError::NotFound(id),
            other => StoreError::Fatal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sqlite_failure(code: i32) -> DbError {
        DbError::Sqlite(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(code),
            Some("simulated".to_string()),
        ))
    }

    #[test]
    fn test_busy_and_locked_map_to_busy() {
        let busy: StoreError = sqlite_failure(rusqlite::ffi::SQLITE_BUSY).into();
        let locked: StoreError = sqlite_failure(rusqlite::ffi::SQLITE_LOCKED).into();
        let exhausted: StoreError = DbError::PoolExhausted("timed out".into()).into();
        assert!(matches!(busy, StoreError::Busy(_)));
        assert!(matches!(locked, StoreError::Busy(_)));
        assert!(matches!(exhausted, StoreError::Busy(_)));
    }

    #[test]
    fn test_other_failures_are_fatal() {
        let full: StoreError = sqlite_failure(rusqlite::ffi::SQLITE_FULL).into();
        let constraint: StoreError = sqlite_failure(rusqlite::ffi::SQLITE_CONSTRAINT).into();
        let corrupt: StoreError = DbError::Corrupt("bad verdict".into()).into();
        assert!(matches!(full, StoreError::Fatal(_)));
        assert!(matches!(constraint, StoreError::Fatal(_)));
        assert!(matches!(corrupt, StoreError::Fatal(_)));
    }

    #[test]
    fn test_not_found_passes_through() {
        let err: StoreError = DbError::NotFound("r-1".into()).into();
        assert_eq!(err, StoreError::NotFound("r-1".into()));
    }
}
