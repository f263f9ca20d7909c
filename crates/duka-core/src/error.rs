//! # Error Types
//!
//! Domain-specific error types for duka-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  duka-core errors (this file)                                          │
//! │  ├── CoreError         - General domain errors                         │
//! │  ├── ValidationErrors  - Every offending field of one record           │
//! │  └── ValidationError   - One offending field                           │
//! │                                                                         │
//! │  duka-db errors         DbError          (store failures)               │
//! │  duka-sync errors       ReplicationError (logged, retried)              │
//! │  duka-node errors       ApiError         (what callers see)             │
//! │                                                                         │
//! │  Flow: ValidationError → ValidationErrors → DbError → ApiError         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// One or more fields of a record failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    /// A `recordType` string that is not part of the closed set.
    #[error("Unknown record type: {0}")]
    UnknownRecordType(String),

    /// A document's `recordType` does not match the variant it was read as.
    ///
    /// ## When This Occurs
    /// - `get::<Product>(id)` on an id that belongs to a sale
    /// - A replicated document whose body disagrees with its envelope
    #[error("Record type mismatch: expected {expected}, found {found}")]
    RecordTypeMismatch { expected: String, found: String },

    /// Date range with `from` after `to`.
    #[error("Invalid date range: {from} is after {to}")]
    InvalidDateRange { from: String, to: String },

    /// Selector that cannot be evaluated (bad regex, bad field path).
    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    /// Timestamp that is not RFC 3339.
    #[error("Invalid timestamp '{value}': {reason}")]
    InvalidTimestamp { value: String, reason: String },

    /// A statement total does not fit in an `i64` amount.
    #[error("{figure} is too large to total")]
    AmountOverflow { figure: String },

    /// JSON (de)serialization of a document failed.
    #[error("Serialization failed: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Serialization(err.to_string())
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// A single field validation failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    Negative { field: String },

    /// Invalid format (e.g., bad phone number, bad id).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Two fields that must agree do not.
    ///
    /// ## When This Occurs
    /// - `totalAmount` differs from the sum of item subtotals
    /// - A balance-sheet category filed under the wrong entry type
    #[error("{field} is inconsistent: {reason}")]
    Inconsistent { field: String, reason: String },
}

impl ValidationError {
    /// Name of the offending field.
    pub fn field(&self) -> &str {
        match self {
            ValidationError::Required { field }
            | ValidationError::TooLong { field, .. }
            | ValidationError::MustBePositive { field }
            | ValidationError::Negative { field }
            | ValidationError::InvalidFormat { field, .. }
            | ValidationError::NotAllowed { field, .. }
            | ValidationError::Inconsistent { field, .. } => field,
        }
    }
}

/// Every validation failure found on one record.
///
/// Write services return this so callers see all offending fields at once
/// instead of fixing them one round trip at a time.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValidationErrors {
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(error: ValidationError) -> Self {
        ValidationErrors {
            errors: vec![error],
        }
    }

    pub fn push(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// Merges nested errors, prefixing their fields (e.g. `items[2].quantity`).
    pub fn extend_prefixed(&mut self, prefix: &str, nested: ValidationErrors) {
        for error in nested.errors {
            self.errors.push(prefix_field(prefix, error));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// Offending field names in the order they were found.
    pub fn fields(&self) -> Vec<&str> {
        self.errors.iter().map(ValidationError::field).collect()
    }

    /// `Ok(())` when nothing was recorded.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validation failed: ")?;
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

impl From<ValidationError> for ValidationErrors {
    fn from(error: ValidationError) -> Self {
        ValidationErrors::single(error)
    }
}

fn prefix_field(prefix: &str, error: ValidationError) -> ValidationError {
    let join = |field: String| format!("{}.{}", prefix, field);
    match error {
        ValidationError::Required { field } => ValidationError::Required { field: join(field) },
        ValidationError::TooLong { field, max } => ValidationError::TooLong {
            field: join(field),
            max,
        },
        ValidationError::MustBePositive { field } => {
            ValidationError::MustBePositive { field: join(field) }
        }
        ValidationError::Negative { field } => ValidationError::Negative { field: join(field) },
        ValidationError::InvalidFormat { field, reason } => ValidationError::InvalidFormat {
            field: join(field),
            reason,
        },
        ValidationError::NotAllowed { field, allowed } => ValidationError::NotAllowed {
            field: join(field),
            allowed,
        },
        ValidationError::Inconsistent { field, reason } => ValidationError::Inconsistent {
            field: join(field),
            reason,
        },
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "phone".to_string(),
        };
        assert_eq!(err.to_string(), "phone is required");

        let err = ValidationError::MustBePositive {
            field: "amount".to_string(),
        };
        assert_eq!(err.to_string(), "amount must be positive");
    }

    #[test]
    fn test_validation_errors_list_every_field() {
        let mut errors = ValidationErrors::new();
        errors.push(ValidationError::Required {
            field: "name".into(),
        });
        errors.push(ValidationError::Required {
            field: "phone".into(),
        });

        assert_eq!(errors.fields(), vec!["name", "phone"]);
        assert_eq!(
            errors.to_string(),
            "Validation failed: name is required; phone is required"
        );
    }

    #[test]
    fn test_prefixed_nested_errors() {
        let mut outer = ValidationErrors::new();
        outer.extend_prefixed(
            "items[1]",
            ValidationErrors::single(ValidationError::MustBePositive {
                field: "quantity".into(),
            }),
        );
        assert_eq!(outer.fields(), vec!["items[1].quantity"]);
    }

    #[test]
    fn test_empty_errors_are_ok() {
        assert!(ValidationErrors::new().into_result().is_ok());
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let core_err: CoreError = ValidationErrors::single(ValidationError::Required {
            field: "name".into(),
        })
        .into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
