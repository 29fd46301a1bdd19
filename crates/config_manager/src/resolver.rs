//! Configuration resolution.
//!
//! The resolver assembles the effective desired state for one repository from
//! the configuration layers (deployment → org → suborg → repo → override) and
//! answers the scope question: is this repository one we are allowed to touch
//! at all?
//!
//! The deployment layer is process-cached and read-only; everything loaded
//! from the admin repository is fetched fresh at the requested ref on every
//! resolution, so pull-request dry-runs evaluate exactly the commit under
//! review.

use crate::deployment::DeploymentDefaults;
use crate::env::WardenEnv;
use crate::errors::ConfigurationResult;
use crate::layering::{merge_layers, ConfigLayer, LayerKind};
use crate::settings::DesiredConfig;
use crate::source::ConfigSource;
use crate::suborg::{SubOrgConfig, SubOrgMatcher};
use github_client::{RepoKey, RepositoryAdmin};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument};

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod tests;

/// Why a repository is (or is not) eligible for reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub enum ScopeDecision {
    /// The repository may be reconciled.
    InScope,

    /// The repository is on the built-in deny-list (the admin repository,
    /// `.github`, the service's own repository) and was not explicitly
    /// included.
    DefaultDenied,

    /// The repository is excluded by the `restrictedRepos` rules.
    Restricted,

    /// The repository name fails the configured validator pattern.
    ValidatorFailed { pattern: String },
}

/// Resolves layered configuration into a [`DesiredConfig`] per repository.
pub struct ConfigResolver {
    source: Arc<dyn ConfigSource>,
    admin: Arc<dyn RepositoryAdmin>,
    matcher: SubOrgMatcher,
    env: WardenEnv,
    deployment: DeploymentDefaults,
}

impl ConfigResolver {
    pub fn new(
        source: Arc<dyn ConfigSource>,
        admin: Arc<dyn RepositoryAdmin>,
        env: WardenEnv,
        deployment: DeploymentDefaults,
    ) -> Self {
        Self {
            source,
            matcher: SubOrgMatcher::new(admin.clone()),
            admin,
            env,
            deployment,
        }
    }

    /// The deployment environment this resolver was built with.
    pub fn env(&self) -> &WardenEnv {
        &self.env
    }

    /// Resolves the effective desired state for one repository.
    ///
    /// `override_document`, when present, becomes the highest-precedence layer
    /// (used for rename pseudo-configs).
    ///
    /// # Errors
    ///
    /// Propagates document load/parse failures and
    /// `ConfigurationError::SubOrgConflict` when the repository matches more
    /// than one fragment — errors that mean the desired state itself could not
    /// be established.
    #[instrument(skip(self, override_document), fields(repository = %repo))]
    pub async fn resolve(
        &self,
        repo: &RepoKey,
        git_ref: Option<&str>,
        override_document: Option<Value>,
    ) -> ConfigurationResult<DesiredConfig> {
        let mut layers = vec![ConfigLayer::new(
            LayerKind::Deployment,
            &self.env.deployment_config_file,
            self.deployment.document().clone(),
        )];

        let settings_path = self.env.settings_path();
        if let Some(document) = self.source.load_yaml(&settings_path, git_ref).await? {
            layers.push(ConfigLayer::new(LayerKind::Org, settings_path, document));
        } else {
            debug!(path = %settings_path, "No org settings document at ref");
        }

        let fragments = self.load_suborg_configs(git_ref).await?;
        if let Some(fragment) = self.matcher.matching_suborg(repo, &fragments).await? {
            info!(suborg = %fragment.name, "Applying suborg fragment");
            layers.push(ConfigLayer::new(
                LayerKind::SubOrg,
                fragment.path,
                fragment.document,
            ));
        }

        let repo_config_path = self.env.repo_config_path(&repo.name);
        if let Some(document) = self.source.load_yaml(&repo_config_path, git_ref).await? {
            layers.push(ConfigLayer::new(LayerKind::Repo, repo_config_path, document));
        }

        if let Some(document) = override_document {
            layers.push(ConfigLayer::new(LayerKind::Override, "override", document));
        }

        let merged = merge_layers(&layers);
        DesiredConfig::from_document(merged)
    }

    /// Loads every sub-organization fragment at the requested ref.
    pub async fn load_suborg_configs(
        &self,
        git_ref: Option<&str>,
    ) -> ConfigurationResult<Vec<SubOrgConfig>> {
        let dir = self.env.suborgs_dir();
        let files = self.source.list_yaml_files(&dir, git_ref).await?;

        let mut fragments = Vec::with_capacity(files.len());
        for file in files {
            let Some(document) = self.source.load_yaml(&file.path, git_ref).await? else {
                continue;
            };
            fragments.push(SubOrgConfig::new(file.name, file.path, document));
        }
        Ok(fragments)
    }

    /// Loads one fragment by name, if it exists.
    pub async fn load_suborg_config(
        &self,
        name: &str,
        git_ref: Option<&str>,
    ) -> ConfigurationResult<Option<SubOrgConfig>> {
        let path = format!("{}/{}.yml", self.env.suborgs_dir(), name);
        Ok(self
            .source
            .load_yaml(&path, git_ref)
            .await?
            .map(|document| SubOrgConfig::new(name, path, document)))
    }

    /// The repositories belonging to a sub-organization fragment: the
    /// organization's repositories filtered through the fragment's membership
    /// rules.
    pub async fn suborg_member_repos(
        &self,
        org: &str,
        fragment: &SubOrgConfig,
    ) -> ConfigurationResult<Vec<String>> {
        let org_repos = self
            .admin
            .list_org_repositories(org)
            .await
            .map_err(|e| crate::errors::ConfigurationError::SourceError {
                path: format!("orgs/{org}/repos"),
                reason: e.to_string(),
            })?;

        let mut members = Vec::new();
        for repo in org_repos {
            let Some(name) = repo["name"].as_str() else {
                continue;
            };
            let key = RepoKey::new(org, name);
            if self.matcher.is_member_of(&key, fragment).await? {
                members.push(name.to_string());
            }
        }
        Ok(members)
    }

    /// Decides whether a repository is eligible for reconciliation under the
    /// resolved configuration.
    ///
    /// The built-in deny-list (admin repository, `.github`, the service's own
    /// repository, plus any deployment-level flat list) always wins unless the
    /// name is explicitly included in `restrictedRepos.include`.
    pub fn check_scope(
        &self,
        desired: &DesiredConfig,
        repo_name: &str,
    ) -> ConfigurationResult<ScopeDecision> {
        let default_denied = repo_name == self.env.admin_repo
            || repo_name == ".github"
            || repo_name == "org-warden"
            || self.deployment.denied_repos().iter().any(|n| n == repo_name);

        if default_denied && !desired.restricted_repos.explicitly_includes(repo_name) {
            return Ok(ScopeDecision::DefaultDenied);
        }

        if desired.restricted_repos.is_restricted(repo_name) {
            return Ok(ScopeDecision::Restricted);
        }

        if let Some(validator) = &desired.validator {
            if !validator.is_valid(repo_name)? {
                return Ok(ScopeDecision::ValidatorFailed {
                    pattern: validator.pattern.clone(),
                });
            }
        }

        Ok(ScopeDecision::InScope)
    }
}
