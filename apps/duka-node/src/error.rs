//! # API Error Type
//!
//! The one error shape every operation returns.
//!
//! ```text
//! argument decoding ──────────────▶ VALIDATION_ERROR
//! DbError::NotFound ──────────────▶ NOT_FOUND
//! DbError::Validation / Rejected ─▶ VALIDATION_ERROR  (+ detail.fields)
//! other DbError ──── logged ──────▶ STORE_ERROR       (generic message)
//! unknown operation name ─────────▶ UNSUPPORTED_OPERATION
//! replication status ─────────────▶ REPLICATION_ERROR
//! panic inside an operation ──────▶ INTERNAL
//! ```
//!
//! Serialized inside the response envelope:
//! `{ "success": false, "error": { "code": "NOT_FOUND", "message": .., "detail": null } }`

use serde::Serialize;
use serde_json::{json, Value};

use duka_core::CoreError;
use duka_db::DbError;
use duka_sync::ReplicationError;

/// Error returned from an operation.
///
/// ## Serialization
/// ```json
/// {
///   "code": "VALIDATION_ERROR",
///   "message": "Validation failed: name is required",
///   "detail": { "fields": ["name"] }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    /// e.g. `{"fields": [..]}` for validation, `{"operation", "argument"}` for bad args
    pub detail: Option<Value>,
}

/// Error codes for operation responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Record not found, or it belongs to another tenant
    NotFound,

    /// Arguments or record fields failed validation
    ValidationError,

    /// The local store could not complete the request
    StoreError,

    /// Operation name is not part of the closed set
    UnsupportedOperation,

    /// Replication status could not be read
    ReplicationError,

    /// Anything else, including a panicking operation
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::StoreError => "STORE_ERROR",
            ErrorCode::UnsupportedOperation => "UNSUPPORTED_OPERATION",
            ErrorCode::ReplicationError => "REPLICATION_ERROR",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = Some(detail);
        self
    }

    pub fn not_found(resource: &str, id: &str) -> Self {
        ApiError::new(ErrorCode::NotFound, format!("{} not found: {}", resource, id))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    pub fn unsupported(operation: &str) -> Self {
        ApiError::new(
            ErrorCode::UnsupportedOperation,
            format!("Unsupported operation: {}", operation),
        )
        .with_detail(json!({ "operation": operation }))
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ApiError::not_found(&entity, &id),
            DbError::Validation(errors) => ApiError::validation(errors.to_string())
                .with_detail(json!({ "fields": errors.fields() })),
            DbError::Rejected(reason) => ApiError::validation(reason),
            DbError::InvalidQuery(reason) => ApiError::validation(reason),
            DbError::Serialization(_)
            | DbError::ConnectionFailed(_)
            | DbError::MigrationFailed(_)
            | DbError::QueryFailed(_)
            | DbError::PoolExhausted
            | DbError::Internal(_) => {
                tracing::error!(error = %err, "Store failure surfaced to caller");
                ApiError::new(ErrorCode::StoreError, "The local store could not complete the request")
            }
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(errors) => ApiError::validation(errors.to_string())
                .with_detail(json!({ "fields": errors.fields() })),
            CoreError::RecordTypeMismatch { .. } => {
                ApiError::new(ErrorCode::NotFound, err.to_string())
            }
            CoreError::Serialization(e) => {
                tracing::error!(error = %e, "Operation result could not be encoded");
                ApiError::internal("Response could not be encoded")
            }
            CoreError::UnknownRecordType(_)
            | CoreError::InvalidDateRange { .. }
            | CoreError::InvalidSelector(_)
            | CoreError::InvalidTimestamp { .. }
            | CoreError::AmountOverflow { .. } => ApiError::validation(err.to_string()),
        }
    }
}

impl From<ReplicationError> for ApiError {
    fn from(err: ReplicationError) -> Self {
        ApiError::new(ErrorCode::ReplicationError, err.to_string())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for ApiError {}

#[cfg(test)]
mod tests {
    use super::*;
    use duka_core::{ValidationError, ValidationErrors};

    #[test]
    fn test_validation_lists_fields() {
        let mut errors = ValidationErrors::new();
        errors.push(ValidationError::Required { field: "name".into() });
        errors.push(ValidationError::MustBePositive { field: "amount".into() });

        let api = ApiError::from(DbError::Validation(errors));
        assert_eq!(api.code, ErrorCode::ValidationError);
        assert_eq!(api.detail, Some(json!({ "fields": ["name", "amount"] })));
    }

    #[test]
    fn test_not_found_maps_code() {
        let api = ApiError::from(DbError::not_found("Customer", "s1:abc"));
        assert_eq!(api.code, ErrorCode::NotFound);
        assert_eq!(api.message, "Customer not found: s1:abc");
    }

    #[test]
    fn test_query_failure_hides_details() {
        let api = ApiError::from(DbError::QueryFailed("disk I/O error at page 7".into()));
        assert_eq!(api.code, ErrorCode::StoreError);
        assert!(!api.message.contains("page 7"));
    }

    #[test]
    fn test_serializes_screaming_codes() {
        let value = serde_json::to_value(ApiError::unsupported("deleteEverything")).unwrap();
        assert_eq!(value["code"], "UNSUPPORTED_OPERATION");
        assert_eq!(value["detail"]["operation"], "deleteEverything");
    }
}
