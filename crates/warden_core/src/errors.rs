//! Error types for the reconciliation engine.
//!
//! Most failures never surface as `Err` values at the crate boundary: per-plugin
//! transport errors are converted into `ERROR`-severity change records so that
//! one failing resource kind cannot abort its siblings. The variants here cover
//! what remains — configuration resolution failures (the desired state could
//! not be established at all) and the few conditions that abort a single
//! repository's run.

use thiserror::Error;

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;

/// Errors from a reconciliation run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The desired state could not be established (document load/parse
    /// failure, sub-organization conflict). Always propagates to the caller.
    #[error(transparent)]
    Configuration(#[from] config_manager::ConfigurationError),

    /// A remote call failed. Caught at the plugin boundary and converted into
    /// an error record; only escapes when configuration documents themselves
    /// cannot be fetched.
    #[error("GitHub API error: {0}")]
    Transport(#[from] github_client::Error),

    /// An externally-defined override could not be resolved.
    #[error("Override resolution failed for '{field}': {reason}")]
    OverrideResolution { field: String, reason: String },

    /// The target repository disappeared mid-run. Aborts this repository's
    /// run only.
    #[error("Repository {repo} no longer exists")]
    RepositoryVanished { repo: String },
}

/// Result type alias for engine operations.
pub type SyncResult<T> = Result<T, SyncError>;
