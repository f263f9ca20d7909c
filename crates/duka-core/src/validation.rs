//! # Validation
//!
//! Field validators used by every record variant's `validate()`.
//!
//! ## How Records Validate
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Customer::validate()                                                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  let mut v = Validator::new();                                          │
//! │  v.check(validate_required("name", &self.name));    ── ok               │
//! │  v.check(validate_phone("phone", &self.phone));     ── Required         │
//! │  v.check(validate_email("email", &self.email));     ── InvalidFormat    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  v.finish() → Err(ValidationErrors [phone, email])                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Single-field validators return [`ValidationResult`] so they can be used
//! directly; [`Validator`] accumulates them so a record reports every
//! offending field at once.

use crate::error::{ValidationError, ValidationErrors};

/// Result type for single-field validation.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Maximum length of free-text names and descriptions.
pub const MAX_TEXT_LEN: usize = 200;

// =============================================================================
// Accumulator
// =============================================================================

/// Collects validation failures across fields.
#[derive(Debug, Default)]
pub struct Validator {
    errors: ValidationErrors,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the error of a failed check.
    pub fn check(&mut self, result: ValidationResult<()>) -> &mut Self {
        if let Err(error) = result {
            self.errors.push(error);
        }
        self
    }

    /// Records a nested record's failures under `prefix`.
    pub fn nested(&mut self, prefix: &str, result: Result<(), ValidationErrors>) -> &mut Self {
        if let Err(errors) = result {
            self.errors.extend_prefixed(prefix, errors);
        }
        self
    }

    pub fn push(&mut self, error: ValidationError) -> &mut Self {
        self.errors.push(error);
        self
    }

    pub fn finish(self) -> Result<(), ValidationErrors> {
        self.errors.into_result()
    }
}

// =============================================================================
// String Validators
// =============================================================================

/// Validates a required free-text field (name, description).
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most [`MAX_TEXT_LEN`] characters
///
/// ## Example
/// ```rust
/// use duka_core::validation::validate_required;
///
/// assert!(validate_required("name", "Mama Mboga").is_ok());
/// assert!(validate_required("name", "   ").is_err());
/// ```
pub fn validate_required(field: &str, value: &str) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > MAX_TEXT_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_TEXT_LEN,
        });
    }

    Ok(())
}

/// Validates a phone number.
///
/// ## Rules
/// - Required
/// - Digits, spaces, hyphens and a single leading `+`
/// - Between 7 and 15 digits
///
/// ## Example
/// ```rust
/// use duka_core::validation::validate_phone;
///
/// assert!(validate_phone("phone", "+254 712 345678").is_ok());
/// assert!(validate_phone("phone", "call me").is_err());
/// ```
pub fn validate_phone(field: &str, phone: &str) -> ValidationResult<()> {
    let phone = phone.trim();

    if phone.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    let body = phone.strip_prefix('+').unwrap_or(phone);
    if !body
        .chars()
        .all(|c| c.is_ascii_digit() || c == ' ' || c == '-')
    {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must contain only digits, spaces and hyphens".to_string(),
        });
    }

    let digits = body.chars().filter(char::is_ascii_digit).count();
    if !(7..=15).contains(&digits) {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must have between 7 and 15 digits".to_string(),
        });
    }

    Ok(())
}

/// Validates an optional email address (only checked when present).
pub fn validate_email(field: &str, email: &Option<String>) -> ValidationResult<()> {
    let Some(email) = email.as_deref().map(str::trim) else {
        return Ok(());
    };
    if email.is_empty() {
        return Ok(());
    }

    let valid = email
        .split_once('@')
        .map(|(local, domain)| !local.is_empty() && domain.contains('.'))
        .unwrap_or(false);

    if !valid {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must be a valid email address".to_string(),
        });
    }

    Ok(())
}

/// Validates a reference to another document (`tenantId:uuid`).
pub fn validate_document_id(field: &str, id: &str) -> ValidationResult<()> {
    let id = id.trim();

    if id.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    match id.split_once(':') {
        Some((tenant, rest)) if !tenant.is_empty() && !rest.is_empty() => Ok(()),
        _ => Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must look like tenantId:uuid".to_string(),
        }),
    }
}

/// Validates an optional document reference (only checked when present).
pub fn validate_optional_id(field: &str, id: &Option<String>) -> ValidationResult<()> {
    match id {
        Some(id) => validate_document_id(field, id),
        None => Ok(()),
    }
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates an amount that must be strictly positive (payments, expenses).
pub fn validate_positive(field: &str, value: i64) -> ValidationResult<()> {
    if value <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }

    Ok(())
}

/// Validates an amount or price that may be zero but not negative.
///
/// ## Example
/// ```rust
/// use duka_core::validation::validate_non_negative;
///
/// assert!(validate_non_negative("unitPrice", 0).is_ok());
/// assert!(validate_non_negative("unitPrice", -1).is_err());
/// ```
pub fn validate_non_negative(field: &str, value: i64) -> ValidationResult<()> {
    if value < 0 {
        return Err(ValidationError::Negative {
            field: field.to_string(),
        });
    }

    Ok(())
}

/// Validates a unit conversion factor (`> 0` and finite).
pub fn validate_conversion_factor(field: &str, factor: f64) -> ValidationResult<()> {
    if !factor.is_finite() || factor <= 0.0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_required() {
        assert!(validate_required("name", "Unga 2kg").is_ok());
        assert!(validate_required("name", "").is_err());
        assert!(validate_required("name", &"x".repeat(201)).is_err());
    }

    #[test]
    fn test_validate_phone() {
        assert!(validate_phone("phone", "0712345678").is_ok());
        assert!(validate_phone("phone", "+254-712-345-678").is_ok());
        assert!(validate_phone("phone", "12").is_err());
        assert!(validate_phone("phone", "07x2345678").is_err());
        assert!(matches!(
            validate_phone("phone", ""),
            Err(ValidationError::Required { .. })
        ));
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("email", &None).is_ok());
        assert!(validate_email("email", &Some("a@b.co".into())).is_ok());
        assert!(validate_email("email", &Some("nope".into())).is_err());
    }

    #[test]
    fn test_validate_document_id() {
        assert!(validate_document_id("customerId", "store-1:abc").is_ok());
        assert!(validate_document_id("customerId", "abc").is_err());
        assert!(validate_document_id("customerId", ":abc").is_err());
    }

    #[test]
    fn test_numeric_validators() {
        assert!(validate_positive("amount", 1).is_ok());
        assert!(validate_positive("amount", 0).is_err());
        assert!(validate_non_negative("stock", 0).is_ok());
        assert!(validate_conversion_factor("conversionFactor", 12.0).is_ok());
        assert!(validate_conversion_factor("conversionFactor", 0.0).is_err());
        assert!(validate_conversion_factor("conversionFactor", f64::NAN).is_err());
    }

    #[test]
    fn test_validator_accumulates() {
        let mut v = Validator::new();
        v.check(validate_required("name", ""))
            .check(validate_positive("amount", -5))
            .check(validate_required("description", "rent"));

        let errors = v.finish().unwrap_err();
        assert_eq!(errors.fields(), vec!["name", "amount"]);
    }
}
