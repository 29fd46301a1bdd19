//! Configuration document sources.
//!
//! The resolver reads the org-wide settings document and the sub-organization
//! fragments through the [`ConfigSource`] trait so tests can substitute an
//! in-memory store. The production implementation reads the admin repository
//! through the GitHub Contents API at a specific ref — documents are fetched
//! fresh per run and never cached across runs, because a pull-request dry-run
//! must evaluate the exact commit under review.

use crate::errors::{ConfigurationError, ConfigurationResult};
use async_trait::async_trait;
use github_client::{EntryType, RepoKey, RepositoryAdmin};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// A YAML file discovered in a configuration directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    /// File name without extension (e.g. "frontend").
    pub name: String,

    /// Full path inside the admin repository.
    pub path: String,
}

/// Abstract access to the configuration documents in the admin repository.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    /// Loads and parses one YAML document at an optional ref.
    ///
    /// Returns `Ok(None)` when the document does not exist; parse failures are
    /// errors (a malformed settings file must not silently mean "no config").
    async fn load_yaml(
        &self,
        path: &str,
        git_ref: Option<&str>,
    ) -> ConfigurationResult<Option<Value>>;

    /// Lists the YAML files directly inside a directory at an optional ref.
    ///
    /// Returns an empty list when the directory does not exist.
    async fn list_yaml_files(
        &self,
        dir: &str,
        git_ref: Option<&str>,
    ) -> ConfigurationResult<Vec<ConfigFile>>;
}

/// [`ConfigSource`] backed by the admin repository on GitHub.
pub struct GitHubConfigSource {
    admin: Arc<dyn RepositoryAdmin>,
    admin_repo: RepoKey,
}

impl GitHubConfigSource {
    pub fn new(admin: Arc<dyn RepositoryAdmin>, admin_repo: RepoKey) -> Self {
        Self { admin, admin_repo }
    }
}

#[async_trait]
impl ConfigSource for GitHubConfigSource {
    async fn load_yaml(
        &self,
        path: &str,
        git_ref: Option<&str>,
    ) -> ConfigurationResult<Option<Value>> {
        let raw = match self
            .admin
            .get_file_contents(&self.admin_repo, path, git_ref)
            .await
        {
            Ok(raw) => raw,
            Err(github_client::Error::NotFound) => {
                debug!(path, "Configuration document not found");
                return Ok(None);
            }
            Err(e) => {
                return Err(ConfigurationError::SourceError {
                    path: path.to_string(),
                    reason: e.to_string(),
                })
            }
        };

        let document: Value =
            serde_yaml::from_str(&raw).map_err(|e| ConfigurationError::ParseError {
                path: path.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Some(document))
    }

    async fn list_yaml_files(
        &self,
        dir: &str,
        git_ref: Option<&str>,
    ) -> ConfigurationResult<Vec<ConfigFile>> {
        let entries = match self.admin.list_directory(&self.admin_repo, dir, git_ref).await {
            Ok(entries) => entries,
            Err(github_client::Error::NotFound) => return Ok(Vec::new()),
            Err(e) => {
                return Err(ConfigurationError::SourceError {
                    path: dir.to_string(),
                    reason: e.to_string(),
                })
            }
        };

        Ok(entries
            .into_iter()
            .filter(|entry| entry.entry_type == EntryType::File)
            .filter(|entry| entry.name.ends_with(".yml") || entry.name.ends_with(".yaml"))
            .map(|entry| ConfigFile {
                name: entry
                    .name
                    .trim_end_matches(".yaml")
                    .trim_end_matches(".yml")
                    .to_string(),
                path: entry.path,
            })
            .collect())
    }
}
