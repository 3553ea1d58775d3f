//! Configuration validation primitives.
//!
//! Sections implement [`Validate`]; helpers here produce errors that always
//! name the offending field so a failed run points straight at the config key.

use thiserror::Error;

/// Configuration validation error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Value for {field} out of range: {value} not in [{min}, {max}]")]
    OutOfRange {
        field: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Configuration conflict: {reason}")]
    Conflict { reason: String },

    #[error("Multiple validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

impl ValidationError {
    /// Field names mentioned by this error (flattened for `Multiple`).
    pub fn fields(&self) -> Vec<&str> {
        match self {
            Self::MissingField { field }
            | Self::InvalidValue { field, .. }
            | Self::OutOfRange { field, .. } => vec![field.as_str()],
            Self::Conflict { .. } => Vec::new(),
            Self::Multiple(errors) => errors.iter().flat_map(|e| e.fields()).collect(),
        }
    }
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trait for validatable configuration sections.
pub trait Validate {
    /// Validate this configuration section.
    fn validate(&self) -> ValidationResult<()>;
}

/// Fold collected errors into a single result.
///
/// One error is returned as-is; several are wrapped in `Multiple`.
pub fn combine(mut errors: Vec<ValidationError>) -> ValidationResult<()> {
    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(ValidationError::Multiple(errors)),
    }
}

/// Check that `value` is finite and inside `[min, max]`.
pub fn check_range(field: &str, value: f64, min: f64, max: f64) -> ValidationResult<()> {
    if value.is_finite() && value >= min && value <= max {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange {
            field: field.to_string(),
            value,
            min,
            max,
        })
    }
}

/// Check that a count-like setting is non-zero.
pub fn check_non_zero(field: &str, value: usize) -> ValidationResult<()> {
    if value == 0 {
        Err(ValidationError::InvalidValue {
            field: field.to_string(),
            reason: "must be greater than 0".into(),
        })
    } else {
        Ok(())
    }
}
