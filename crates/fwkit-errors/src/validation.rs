//! Configuration validation errors.

use core::fmt;

use crate::common::ErrorSeverity;

/// Errors raised while validating update configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Value out of range
    #[error("{field} value {value} is out of range [{min}, {max}]")]
    OutOfRange {
        /// Field name
        field: String,
        /// The invalid value
        value: String,
        /// Minimum allowed value
        min: String,
        /// Maximum allowed value
        max: String,
    },

    /// Value is required but missing
    #[error("Required field '{0}' is missing")]
    Required(String),

    /// Invalid format
    #[error("Invalid format for field '{field}': {reason}")]
    InvalidFormat {
        /// Field name
        field: String,
        /// Reason for the format error
        reason: String,
    },

    /// Constraint violation spanning several fields
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
}

impl ValidationError {
    /// Get the error severity.
    pub fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Error
    }

    /// Create an out of range error for a numeric value.
    pub fn out_of_range<T: fmt::Debug>(field: impl Into<String>, value: T, min: T, max: T) -> Self {
        ValidationError::OutOfRange {
            field: field.into(),
            value: format!("{value:?}"),
            min: format!("{min:?}"),
            max: format!("{max:?}"),
        }
    }

    /// Create a required field error.
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required(field.into())
    }

    /// Create an invalid format error.
    pub fn invalid_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a constraint violation error.
    pub fn constraint(msg: impl Into<String>) -> Self {
        ValidationError::ConstraintViolation(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_out_of_range() {
        let err = ValidationError::out_of_range("retry.attempts", 0u32, 1, 100);
        assert_eq!(
            err.to_string(),
            "retry.attempts value 0 is out of range [1, 100]"
        );
    }

    #[test]
    fn test_validation_error_required() {
        let err = ValidationError::required("device_id");
        assert_eq!(err.to_string(), "Required field 'device_id' is missing");
    }

    #[test]
    fn test_validation_error_equality() {
        assert_eq!(
            ValidationError::constraint("weights"),
            ValidationError::constraint("weights")
        );
    }
}
