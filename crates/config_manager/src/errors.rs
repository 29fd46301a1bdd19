//! Configuration system error types.
//!
//! Domain-specific errors for configuration loading, parsing, layering, and
//! sub-organization resolution. These are the only errors that propagate to the
//! top-level sync caller: if the desired state itself cannot be established,
//! there is nothing sensible to reconcile.

use thiserror::Error;

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;

/// Configuration system errors.
///
/// These errors occur when loading, parsing, or merging configuration from the
/// deployment file, the admin repository's settings document, or
/// sub-organization fragments.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Failed to access configuration file: {path} - {reason}")]
    FileAccessError { path: String, reason: String },

    #[error("Failed to parse configuration: {path} - {reason}")]
    ParseError { path: String, reason: String },

    #[error("Invalid configuration: {field} - {reason}")]
    InvalidConfiguration { field: String, reason: String },

    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// A repository is claimed by more than one sub-organization fragment.
    ///
    /// Fatal for the affected repository's run; the message names both
    /// fragment paths so the operator can resolve the overlap.
    #[error("Multiple suborg configs for {repository} in {second_path} and {first_path}")]
    SubOrgConflict {
        repository: String,
        first_path: String,
        second_path: String,
    },

    /// A remote configuration document could not be fetched.
    #[error("Failed to load configuration from remote: {path} - {reason}")]
    SourceError { path: String, reason: String },
}

/// Result type alias for configuration operations.
pub type ConfigurationResult<T> = Result<T, ConfigurationError>;
