//! # Store Errors
//!
//! `StoreError` is the only error the backends return. It never leaves the
//! engine as-is: [`From<StoreError> for DocflowError`] maps it onto the
//! engine taxonomy, so `sqlx::Error` stops at this crate boundary.

use thiserror::Error;

use docflow_core::{DocflowError, Missing};

/// SQLSTATE codes that mean "retry the transaction".
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";
const LOCK_NOT_AVAILABLE: &str = "55P03";
const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Errors raised by a storage backend.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Driver or connection failure.
    #[error("database error: {0}")]
    Database(sqlx::Error),

    /// Embedded migrations failed to apply.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Transient lock contention; the whole transaction may be retried.
    #[error("lock contention: {0}")]
    Contention(String),

    /// A referenced row does not exist.
    #[error("missing reference: {0}")]
    Missing(Missing),

    /// A unique key is already taken.
    #[error("duplicate key: {0}")]
    Duplicate(String),

    /// A foreign-key violation the call site did not translate.
    #[error("foreign key violation on {0}")]
    ForeignKey(String),

    /// A stored row violates an invariant the engine relies on.
    #[error("corrupt row: {0}")]
    Corrupt(String),

    /// A write was attempted without first taking the row's lease.
    #[error("lease not held: {0}")]
    LeaseNotHeld(String),
}

impl StoreError {
    /// Constraint name of a foreign-key violation, if this is one.
    pub fn foreign_key(&self) -> Option<&str> {
        match self {
            Self::ForeignKey(constraint) => Some(constraint),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            let constraint = db.constraint().unwrap_or("unknown").to_string();
            match db.code().as_deref() {
                Some(SERIALIZATION_FAILURE | DEADLOCK_DETECTED | LOCK_NOT_AVAILABLE) => {
                    return Self::Contention(db.message().to_string());
                }
                Some(UNIQUE_VIOLATION) => return Self::Duplicate(constraint),
                Some(FOREIGN_KEY_VIOLATION) => return Self::ForeignKey(constraint),
                _ => {}
            }
        }
        Self::Database(err)
    }
}

impl From<StoreError> for DocflowError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Missing(missing) => Self::NotFound(missing),
            StoreError::Contention(msg) => Self::Conflict(msg),
            StoreError::Duplicate(key) => Self::AlreadyExists(key),
            other @ (StoreError::Database(_)
            | StoreError::Migration(_)
            | StoreError::ForeignKey(_)
            | StoreError::Corrupt(_)
            | StoreError::LeaseNotHeld(_)) => {
                tracing::error!(error = %other, "storage failure");
                Self::Internal(other.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docflow_core::{DocumentId, ErrorKind};

    #[test]
    fn missing_maps_to_not_found() {
        let id = DocumentId::new();
        let err: DocflowError = StoreError::Missing(Missing::Document(id)).into();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn contention_maps_to_transient_conflict() {
        let err: DocflowError = StoreError::Contention("deadlock detected".into()).into();
        assert!(err.is_transient());
    }

    #[test]
    fn corruption_and_driver_errors_are_internal() {
        let err: DocflowError = StoreError::Corrupt("status 'x'".into()).into();
        assert_eq!(err.kind(), ErrorKind::Internal);
        let err: DocflowError = StoreError::Database(sqlx::Error::PoolTimedOut).into();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn non_database_sqlx_error_is_wrapped() {
        match StoreError::from(sqlx::Error::RowNotFound) {
            StoreError::Database(sqlx::Error::RowNotFound) => {}
            other => panic!("expected Database(RowNotFound), got {other:?}"),
        }
    }

    #[test]
    fn foreign_key_accessor() {
        let err = StoreError::ForeignKey("documents_template_id_fkey".into());
        assert_eq!(err.foreign_key(), Some("documents_template_id_fkey"));
        assert_eq!(StoreError::Corrupt("x".into()).foreign_key(), None);
    }
}
