//! Error types for the persistence layer.

use taskhub_core::ValidationError;
use thiserror::Error;

/// Errors returned by store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `SQLite` database error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool error.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// Schema migration failed.
    #[error("migration error: {message}")]
    Migration {
        /// Which migration failed and why.
        message: String,
    },

    /// A row with the same unique key already exists.
    #[error("{0}")]
    Conflict(String),

    /// A foreign key points at a row that does not exist.
    #[error("{0}")]
    InvalidReference(String),

    /// Input rejected before it reached the database.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A stored value could not be decoded into a domain type.
    #[error("corrupt row in {table}: {message}")]
    CorruptRow {
        /// Table the row came from.
        table: &'static str,
        /// What was wrong.
        message: String,
    },

    /// The blocking worker running a store call panicked or was cancelled.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Convenience type alias for store results.
pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    /// Map constraint failures to [`StoreError::Conflict`] or
    /// [`StoreError::InvalidReference`]; pass everything else through.
    pub(crate) fn from_write(err: rusqlite::Error, unique_msg: &str, reference_msg: &str) -> Self {
        if let rusqlite::Error::SqliteFailure(ref code, _) = err {
            match code.extended_code {
                rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                    return Self::Conflict(unique_msg.to_string());
                }
                rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY => {
                    return Self::InvalidReference(reference_msg.to_string());
                }
                _ => {}
            }
        }
        Self::Sqlite(err)
    }
}
