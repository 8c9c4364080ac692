use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::error::{AppError, ErrorCode, MSG_FAILED_TO_VALIDATE};

pub const GENERIC_FIELD: &str = "field";
pub const GENERIC_CODE: &str = "VALIDATION_ERROR";

/// One failed rule.
///
/// `field` is the full dotted path of the offending value (`address.city`,
/// `items.0.sku`), not just the leaf name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("field '{field}': {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
    pub code: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            code: code.into(),
        }
    }

    /// Reported when the input cannot be validated at all.
    pub fn generic() -> Self {
        Self::new(GENERIC_FIELD, MSG_FAILED_TO_VALIDATE, GENERIC_CODE)
    }
}

/// Outcome of a validation run; violations keep rule order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
        }
    }

    pub fn from_errors(errors: Vec<ValidationError>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
        }
    }

    pub fn generic() -> Self {
        Self::from_errors(vec![ValidationError::generic()])
    }

    /// `INVALID_INPUT` / "validation failed" with every violation in the details.
    pub fn to_app_error(&self) -> Option<AppError> {
        if self.is_valid {
            return None;
        }
        Some(AppError::with_details(
            ErrorCode::InvalidInput,
            MSG_FAILED_TO_VALIDATE,
            self.to_string(),
        ))
    }

    pub fn into_result(self) -> Result<(), AppError> {
        match self.to_app_error() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

// "field 'a': msg; field 'b': msg" (empty when valid)
impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_result_has_no_app_error() {
        assert!(ValidationResult::valid().to_app_error().is_none());
        assert!(ValidationResult::from_errors(Vec::new()).is_valid);
        assert!(ValidationResult::valid().into_result().is_ok());
    }

    #[test]
    fn app_error_joins_violations() {
        let result = ValidationResult::from_errors(vec![
            ValidationError::new("name", "name is required", "required"),
            ValidationError::new("email", "email must be a valid email address", "email"),
        ]);
        let err = result.to_app_error().unwrap();

        assert_eq!(err.code(), &ErrorCode::InvalidInput);
        assert_eq!(err.message(), "validation failed");
        assert_eq!(
            err.detail_text(),
            Some("field 'name': name is required; field 'email': email must be a valid email address")
        );
    }

    #[test]
    fn generic_violation_shape() {
        let result = ValidationResult::generic();
        assert!(!result.is_valid);
        assert_eq!(result.errors, vec![ValidationError::new("field", "validation failed", "VALIDATION_ERROR")]);
    }
}
