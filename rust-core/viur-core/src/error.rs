//! # Error Handling
//!
//! Centralized error types for the ViUR core.
//! Uses `thiserror` for ergonomic error definitions.
//!
//! Per-field client input problems are *not* errors in this sense; they are
//! reported as [`crate::validation::FieldError`] values and never abort a
//! request. The variants here are either fatal (schema definition) or belong
//! to the request plumbing around the bone layer.

use thiserror::Error;

/// Result type alias for ViUR core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for the ViUR runtime
#[derive(Error, Debug)]
pub enum Error {
    /// A bone was constructed with an invalid combination of options
    #[error("Invalid configuration for bone {bone}: {reason}")]
    Configuration {
        /// Type tag or name of the offending bone
        bone: String,
        /// Why the configuration was rejected
        reason: String,
    },

    /// Two bones with the same name were added to one skeleton
    #[error("Skeleton {skeleton} already has a bone named {bone}")]
    DuplicateBone {
        /// Skeleton kind name
        skeleton: String,
        /// The duplicated bone name
        bone: String,
    },

    /// A configured timezone name is not known to the timezone database
    #[error("Unknown timezone: {zone}")]
    UnknownTimeZone {
        /// The rejected zone name
        zone: String,
    },

    /// Request payload too large
    #[error("Payload too large: limit={limit} bytes, received={actual} bytes")]
    PayloadTooLarge {
        /// Max allowed size
        limit: usize,
        /// Actual size
        actual: usize,
    },

    /// Request body could not be decoded into request data
    #[error("Invalid request body: {reason}")]
    InvalidRequestBody {
        /// Decoder message
        reason: String,
    },

    /// HTTP protocol error
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for a [`Error::Configuration`] error
    pub fn configuration(bone: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration {
            bone: bone.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error() {
        let err = Error::configuration("date", "Attempt to create an empty datebone!");
        assert!(err.to_string().contains("date"));
        assert!(err.to_string().contains("empty datebone"));
    }

    #[test]
    fn test_duplicate_bone_error() {
        let err = Error::DuplicateBone {
            skeleton: "user".to_string(),
            bone: "email".to_string(),
        };
        assert!(err.to_string().contains("user"));
        assert!(err.to_string().contains("email"));
    }

    #[test]
    fn test_payload_too_large() {
        let err = Error::PayloadTooLarge {
            limit: 10,
            actual: 20,
        };
        assert!(err.to_string().contains("limit=10"));
    }
}
