//! Storage-specific error types for SQLite operations.
//!
//! Diesel and r2d2 failures are wrapped here and converted to the
//! database-agnostic errors defined in `pocketbook_core`.

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use pocketbook_core::errors::{DatabaseError, Error};
use thiserror::Error;

/// Storage-specific errors that wrap Diesel and r2d2 types.
///
/// These never leave the crate; they are converted to
/// `pocketbook_core::Error` before being returned to callers.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database connection failed: {0}")]
    ConnectionFailed(#[from] diesel::ConnectionError),

    #[error("Connection pool error: {0}")]
    PoolError(#[from] r2d2::Error),

    #[error("Query execution failed: {0}")]
    QueryFailed(#[from] DieselError),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Core error: {0}")]
    CoreError(Error),
}

/// Lets a write job fail with a domain error and still roll back.
impl From<Error> for StorageError {
    fn from(err: Error) -> Self {
        StorageError::CoreError(err)
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::SerializationError(err.to_string())
    }
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::ConnectionFailed(e) => Error::Database(DatabaseError::ConnectionFailed(e.to_string())),
            StorageError::PoolError(e) => Error::Database(DatabaseError::PoolCreationFailed(e.to_string())),
            StorageError::QueryFailed(DieselError::NotFound) => {
                Error::Database(DatabaseError::NotFound("Record not found".to_string()))
            }
            StorageError::QueryFailed(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info)) => {
                Error::Database(DatabaseError::UniqueViolation(info.message().to_string()))
            }
            StorageError::QueryFailed(e) => Error::Database(DatabaseError::QueryFailed(e.to_string())),
            StorageError::MigrationFailed(e) => Error::Database(DatabaseError::MigrationFailed(e)),
            StorageError::SerializationError(e) => Error::Database(DatabaseError::Internal(e)),
            StorageError::CoreError(e) => e,
        }
    }
}

/// Extension trait for converting Diesel and r2d2 results to core results.
pub trait IntoCore<T> {
    fn into_core(self) -> pocketbook_core::Result<T>;
}

impl<T> IntoCore<T> for std::result::Result<T, DieselError> {
    fn into_core(self) -> pocketbook_core::Result<T> {
        self.map_err(|e| StorageError::from(e).into())
    }
}

impl<T> IntoCore<T> for std::result::Result<T, r2d2::Error> {
    fn into_core(self) -> pocketbook_core::Result<T> {
        self.map_err(|e| StorageError::from(e).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_database_not_found() {
        let err: Error = StorageError::QueryFailed(DieselError::NotFound).into();
        assert!(matches!(err, Error::Database(DatabaseError::NotFound(_))));
    }

    #[test]
    fn test_core_errors_pass_through_unchanged() {
        let err: Error = StorageError::from(Error::NotFound("pocket p-1".to_string())).into();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_serialization_errors_are_internal() {
        let err: Error = StorageError::SerializationError("bad json".to_string()).into();
        assert!(matches!(err, Error::Database(DatabaseError::Internal(_))));
    }
}
