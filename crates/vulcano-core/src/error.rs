//! Error types for Vulcano core operations.
//!
//! This module defines the error types used throughout the `vulcano-core` crate.

use thiserror::Error;

/// Result type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Vulcano core operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A resource could not produce the requested data.
    #[error("{resource}: {message}")]
    Resource {
        /// Display name of the resource (e.g. `/etc/passwd`).
        resource: String,
        /// What went wrong.
        message: String,
    },

    /// A method or property does not exist on a value.
    #[error("undefined method `{method}` for {target}")]
    UndefinedMethod {
        /// Method that was requested.
        method: String,
        /// Description of the receiver.
        target: String,
    },

    /// An argument had the wrong type or count.
    #[error("invalid argument for `{method}`: {reason}")]
    InvalidArgument {
        /// Method that received the argument.
        method: String,
        /// Why the argument was rejected.
        reason: String,
    },

    /// Unknown resource name.
    #[error("unknown resource `{0}`")]
    UnknownResource(String),

    /// A profile reference string could not be interpreted.
    #[error("invalid profile reference '{reference}': {reason}")]
    InvalidReference {
        /// The reference as given.
        reference: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A remote profile could not be fetched.
    #[error("failed to fetch {reference}: {message}")]
    Fetch {
        /// The remote reference.
        reference: String,
        /// Why fetching failed.
        message: String,
    },

    /// Profile metadata (`vulcano.yml`) could not be parsed.
    #[error("invalid profile metadata: {0}")]
    Metadata(#[from] serde_yaml::Error),

    /// Record filter misuse.
    #[error(transparent)]
    Filter(#[from] FilterError),
}

/// Errors raised by the record filter engine.
///
/// Filter misuse is always a hard error; an unsupported operator never
/// degrades into a no-op.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    /// The operator is not one of `== != < <= > >= =~`.
    #[error("unsupported filter operator '{operator}' for field '{field}'")]
    UnknownOperator {
        /// Field the condition applies to.
        field: String,
        /// Operator as written.
        operator: String,
    },

    /// Ordering operators need a numeric operand.
    #[error("operator '{operator}' on field '{field}' needs a numeric value, got {value}")]
    NonNumericOperand {
        /// Field the condition applies to.
        field: String,
        /// Operator as written.
        operator: String,
        /// The offending operand.
        value: String,
    },

    /// The pattern could not be compiled.
    #[error("invalid pattern for field '{field}': {message}")]
    InvalidPattern {
        /// Field the condition applies to.
        field: String,
        /// Regex compiler message.
        message: String,
    },

    /// The filter specification has the wrong shape.
    #[error("malformed filter specification: {0}")]
    Malformed(String),
}
