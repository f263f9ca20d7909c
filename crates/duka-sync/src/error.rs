//! # Replication Error Types
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Replication Error Categories                        │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Transport     │  │     Protocol            │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Connection     │  │  Remote (HTTP status)   │ │
//! │  │  InvalidUrl     │  │  Timeout        │  │  Deserialization        │ │
//! │  │  ConfigLoad     │  │  Bind           │  │  Unauthorized           │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  Retryable: connection, timeout, 5xx/429, local store busy             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Result type alias for replication operations.
pub type ReplicationResult<T> = Result<T, ReplicationError>;

#[derive(Debug, Error)]
pub enum ReplicationError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Invalid replication configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid replica URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// The replica could not be reached.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The hub could not bind its listener.
    #[error("Failed to bind {addr}: {reason}")]
    Bind { addr: String, reason: String },

    // =========================================================================
    // Protocol Errors
    // =========================================================================
    /// The replica answered with a non-success status.
    #[error("Replica returned {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("Replica refused the credential")]
    Unauthorized,

    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),

    // =========================================================================
    // Local Errors
    // =========================================================================
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Replication engine is shutting down")]
    ShuttingDown,
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<duka_db::DbError> for ReplicationError {
    fn from(err: duka_db::DbError) -> Self {
        ReplicationError::DatabaseError(err.to_string())
    }
}

impl From<duka_core::CoreError> for ReplicationError {
    fn from(err: duka_core::CoreError) -> Self {
        ReplicationError::SerializationFailed(err.to_string())
    }
}

impl From<serde_json::Error> for ReplicationError {
    fn from(err: serde_json::Error) -> Self {
        ReplicationError::DeserializationFailed(err.to_string())
    }
}

impl From<url::ParseError> for ReplicationError {
    fn from(err: url::ParseError) -> Self {
        ReplicationError::InvalidUrl(err.to_string())
    }
}

impl From<reqwest::Error> for ReplicationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ReplicationError::Timeout(err.to_string())
        } else if err.is_decode() {
            ReplicationError::DeserializationFailed(err.to_string())
        } else if let Some(status) = err.status() {
            ReplicationError::Remote {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            ReplicationError::ConnectionFailed(err.to_string())
        }
    }
}

impl From<std::io::Error> for ReplicationError {
    fn from(err: std::io::Error) -> Self {
        ReplicationError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for ReplicationError {
    fn from(err: toml::de::Error) -> Self {
        ReplicationError::ConfigLoadFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization (for retry logic)
// =============================================================================

impl ReplicationError {
    /// Returns true if the next cycle may succeed without intervention.
    pub fn is_retryable(&self) -> bool {
        match self {
            ReplicationError::ConnectionFailed(_)
            | ReplicationError::Timeout(_)
            | ReplicationError::DatabaseError(_) => true,
            ReplicationError::Remote { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            ReplicationError::InvalidConfig(_)
                | ReplicationError::InvalidUrl(_)
                | ReplicationError::ConfigLoadFailed(_)
        )
    }
}
