//! # Database Error Types
//!
//! Error types for store and write-service operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)      ValidationErrors (duka-core)          │
//! │       │                                 │                               │
//! │       ▼                                 ▼                               │
//! │  DbError (this module) ← Adds context and categorization               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ApiError (duka-node) ← {success: false, error: {code, message}}       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use duka_core::{CoreError, ValidationErrors};
use thiserror::Error;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Document not found.
    ///
    /// ## When This Occurs
    /// - `get`/`update`/`archive` with an id that was never written
    /// - Id belongs to another tenant
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A write was rejected before touching the database.
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    /// Business rule refused the operation (e.g. credit for a blocked
    /// customer).
    #[error("{0}")]
    Rejected(String),

    /// Stored JSON could not be read back as the expected variant.
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Selector or date range the store cannot evaluate.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// The store file could not be opened, or the pool was closed.
    #[error("Cannot reach store: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("All store connections are busy")]
    PoolExhausted,

    #[error("Store failure: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DbError::NotFound { .. })
    }
}

/// ```text
/// RowNotFound             → NotFound (a fetch_one on a missing document)
/// Database (constraint…)  → QueryFailed
/// PoolTimedOut            → PoolExhausted
/// PoolClosed              → ConnectionFailed (store already closed)
/// anything else           → Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Document", "?"),
            sqlx::Error::Database(e) => DbError::QueryFailed(e.message().to_owned()),
            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("store is closed".into()),
            other => DbError::Internal(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::Serialization(err.to_string())
    }
}

impl From<CoreError> for DbError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(errors) => DbError::Validation(errors),
            CoreError::Serialization(msg) => DbError::Serialization(msg),
            CoreError::RecordTypeMismatch { .. } => DbError::Serialization(err.to_string()),
            CoreError::AmountOverflow { .. } => DbError::Rejected(err.to_string()),
            other => DbError::InvalidQuery(other.to_string()),
        }
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;
    use duka_core::ValidationError;

    #[test]
    fn test_core_errors_map_to_db_errors() {
        let validation: DbError = CoreError::Validation(ValidationErrors::single(
            ValidationError::Required {
                field: "name".into(),
            },
        ))
        .into();
        assert!(matches!(validation, DbError::Validation(_)));

        let range: DbError = CoreError::InvalidDateRange {
            from: "2024-05-02".into(),
            to: "2024-05-01".into(),
        }
        .into();
        assert!(matches!(range, DbError::InvalidQuery(_)));
    }

    #[test]
    fn test_not_found_message() {
        let err = DbError::not_found("Customer", "s1:abc");
        assert_eq!(err.to_string(), "Customer not found: s1:abc");
        assert!(err.is_not_found());
    }
}
