//! # Validation Module
//!
//! Structured per-field errors produced while reading client input.
//!
//! A [`FieldError`] never aborts processing: bones hand them back through
//! their lifecycle calls and the skeleton collects them into
//! [`ValidationErrors`] so a form can be validated as a whole.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// Message used when a value could not be parsed or failed validation
pub const INVALID_VALUE: &str = "Invalid value entered";

/// Message used when a required value is empty
pub const NO_VALUE: &str = "No value entered";

/// Message used when a required field is missing from the request entirely
pub const NOT_SUBMITTED: &str = "Field not submitted";

/// How severe a client error is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorSeverity {
    /// The field was not part of the submitted data
    NotSet,
    /// A value was submitted but it is empty
    Empty,
    /// A value was submitted but it is malformed or out of range
    Invalid,
}

/// A single validation error for a specific field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Field path (e.g. `"created"`, `"name.de"`, `"tags.2"`)
    pub field: String,
    /// Human-readable error message
    pub message: String,
    /// Machine-readable severity
    pub severity: ErrorSeverity,
}

impl FieldError {
    /// Create a new field error
    pub fn new(
        field: impl Into<String>,
        message: impl Into<String>,
        severity: ErrorSeverity,
    ) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            severity,
        }
    }

    /// Create an "Invalid value entered" error
    pub fn invalid(field: impl Into<String>) -> Self {
        Self::new(field, INVALID_VALUE, ErrorSeverity::Invalid)
    }

    /// Create a "No value entered" error
    pub fn empty(field: impl Into<String>) -> Self {
        Self::new(field, NO_VALUE, ErrorSeverity::Empty)
    }

    /// Create a "Field not submitted" error
    pub fn not_set(field: impl Into<String>) -> Self {
        Self::new(field, NOT_SUBMITTED, ErrorSeverity::NotSet)
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Collection of validation errors
///
/// Allows aggregating multiple field errors for a single request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    /// List of field-level errors
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    /// Create an empty error collection
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field error
    pub fn add(&mut self, error: FieldError) {
        self.errors.push(error);
    }

    /// Merge another collection into this one
    pub fn merge(&mut self, other: Self) {
        self.errors.extend(other.errors);
    }

    /// Check if there are any errors
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Get the number of errors
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// `Ok(())` when empty, `Err(self)` otherwise
    ///
    /// # Errors
    ///
    /// Returns the collection itself if it holds at least one error.
    pub fn into_result(self) -> ValidationResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    /// Convert to JSON response body
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"errors":[]}"#.to_string())
    }

    /// Group errors by field
    #[must_use]
    pub fn by_field(&self) -> HashMap<String, Vec<&FieldError>> {
        let mut map: HashMap<String, Vec<&FieldError>> = HashMap::new();
        for error in &self.errors {
            map.entry(error.field.clone()).or_default().push(error);
        }
        map
    }
}

impl From<FieldError> for ValidationErrors {
    fn from(error: FieldError) -> Self {
        Self {
            errors: vec![error],
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} validation error(s)", self.errors.len())
    }
}

impl std::error::Error for ValidationErrors {}

/// Result type for validation operations
pub type ValidationResult<T> = std::result::Result<T, ValidationErrors>;
