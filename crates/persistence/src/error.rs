use common::{AggregateId, ErrorKind, HasErrorKind};
use domain::DomainError;
use thiserror::Error;

/// Errors that can occur in the unit of work or a repository.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// A transaction handle was requested, or commit/rollback called, while idle.
    #[error("No transaction is active")]
    NoActiveTransaction,

    /// `start` was called while a transaction was already open.
    #[error("A transaction is already active")]
    TransactionAlreadyActive,

    /// A row with the same primary key already exists.
    #[error("Duplicate key for {aggregate_type} with id {id}")]
    DuplicateKey {
        aggregate_type: &'static str,
        id: AggregateId,
    },

    /// The commit was refused by the backend.
    #[error("Commit failed: {0}")]
    CommitFailed(String),

    /// A domain rule failed while loading or writing an entity.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl HasErrorKind for PersistenceError {
    fn kind(&self) -> ErrorKind {
        match self {
            PersistenceError::NoActiveTransaction | PersistenceError::TransactionAlreadyActive => {
                ErrorKind::Programming
            }
            PersistenceError::DuplicateKey { .. } => ErrorKind::EntityValidation,
            PersistenceError::Domain(e) => e.kind(),
            PersistenceError::CommitFailed(_) | PersistenceError::Database(_) => {
                ErrorKind::Transaction
            }
            PersistenceError::Migration(_) => ErrorKind::Infrastructure,
        }
    }
}

/// Result type for persistence operations.
pub type Result<T> = std::result::Result<T, PersistenceError>;
