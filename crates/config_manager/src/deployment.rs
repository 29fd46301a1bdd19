//! Deployment default configuration.
//!
//! The deployment defaults document lives on disk next to the service (not in
//! the admin repository) and forms the lowest configuration layer. It is loaded
//! at most once per process lifetime and treated as immutable read-only state
//! thereafter; a process restart is required to pick up changes.

use crate::errors::{ConfigurationError, ConfigurationResult};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, info};

#[cfg(test)]
#[path = "deployment_tests.rs"]
mod tests;

static DEPLOYMENT: OnceLock<DeploymentDefaults> = OnceLock::new();

/// The parsed deployment defaults document.
///
/// When the configured file does not exist, the fallback document restricts the
/// admin repository, `.github`, and the service's own repository from being
/// configured, and nothing else.
#[derive(Debug, Clone, PartialEq)]
pub struct DeploymentDefaults {
    document: Value,
}

impl DeploymentDefaults {
    /// Loads the deployment defaults from disk, or builds the fallback document
    /// when the file is absent.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::ParseError` when the file exists but is not
    /// valid YAML, and `FileAccessError` when it cannot be read.
    pub fn load(path: &Path, admin_repo: &str) -> ConfigurationResult<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No deployment config file, using fallback restrictions");
            return Ok(Self {
                document: json!({
                    "restrictedRepos": [admin_repo, ".github", "org-warden"],
                }),
            });
        }

        let raw = std::fs::read_to_string(path).map_err(|e| {
            ConfigurationError::FileAccessError {
                path: path.display().to_string(),
                reason: e.to_string(),
            }
        })?;

        let document: Value =
            serde_yaml::from_str(&raw).map_err(|e| ConfigurationError::ParseError {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        info!(path = %path.display(), "Loaded deployment defaults");
        Ok(Self { document })
    }

    /// Loads the deployment defaults once per process and returns the cached
    /// instance on every later call, regardless of the path argument.
    pub fn load_cached(path: &Path, admin_repo: &str) -> ConfigurationResult<&'static Self> {
        if let Some(cached) = DEPLOYMENT.get() {
            return Ok(cached);
        }
        let loaded = Self::load(path, admin_repo)?;
        Ok(DEPLOYMENT.get_or_init(|| loaded))
    }

    /// Builds deployment defaults from an already-parsed document. Used by
    /// tests and by callers that manage the document themselves.
    pub fn from_document(document: Value) -> Self {
        Self { document }
    }

    /// The raw deployment document, used as the lowest configuration layer.
    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Repository names the deployment denies by default.
    ///
    /// The fallback document stores `restrictedRepos` as a plain name list; a
    /// deployment-authored document may use the `{include, exclude}` object
    /// form instead, in which case the denial logic lives in the merged
    /// restriction rules rather than here.
    pub fn denied_repos(&self) -> Vec<String> {
        match self.document.get("restrictedRepos") {
            Some(Value::Array(names)) => names
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }
}
