//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while preparing records.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// No known date pattern matched the input.
    #[error("unrecognized date: {input:?}")]
    UnrecognizedDate {
        /// The offending input.
        input: String,
    },

    /// A filter or field value did not resolve to a taxonomy term.
    #[error("taxonomy value for {field} could not be resolved: {value:?}")]
    UnresolvedTerm {
        /// Field name as supplied by the caller.
        field: String,
        /// The value that failed to resolve.
        value: String,
    },
}

impl CodecError {
    /// Create an unrecognized date error.
    pub fn unrecognized_date(input: impl Into<String>) -> Self {
        Self::UnrecognizedDate {
            input: input.into(),
        }
    }

    /// Create an unresolved term error.
    pub fn unresolved_term(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::UnresolvedTerm {
            field: field.into(),
            value: value.into(),
        }
    }
}
