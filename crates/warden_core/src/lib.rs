//! Core reconciliation engine for org-warden.
//!
//! Computes and applies the delta between the desired configuration (resolved
//! by `config_manager`) and the live state of each repository (read through
//! `github_client`). The building blocks:
//!
//! - [`diff`] — structural deep-diff for change detection and dry-run reports
//! - [`overrides`] — `{{EXTERNALLY_DEFINED}}` sentinel resolution
//! - [`change_record`] — the dry-run unit and run reports
//! - [`reconciler`] — the generic diffable engine and the two-mode executor
//! - [`plugins`] — one thin adapter per resource kind
//!
//! [`Warden`] is the reconciliation driver: one entry point per scope (single
//! repository, sub-organization, whole organization), each usable in dry-run
//! or apply mode.

use config_manager::{ConfigResolver, DesiredConfig, ScopeDecision};
use futures::future::join_all;
use github_client::{RepositoryAdmin, RulesetScope};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, instrument, warn};

pub mod change_record;
pub mod diff;
pub mod errors;
pub mod overrides;
pub mod reconciler;

pub mod plugins;

#[cfg(test)]
pub(crate) mod test_support;

pub use change_record::{ChangeRecord, Severity, SyncReport};
pub use diff::{compare, DiffResult};
pub use errors::{SyncError, SyncResult};
pub use overrides::{OverrideContext, OverrideDirective, EXTERNALLY_DEFINED};
pub use reconciler::{reconcile, Diffable, Executor, SyncMode};

// Re-export the identifiers callers pass in.
pub use github_client::{ApiCall, RepoKey};

// Reference the tests module in the separate file
#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

/// Plugin label used for records produced by the driver itself (scope skips,
/// configuration failures).
const DRIVER_PLUGIN: &str = "settings";

/// The reconciliation driver.
///
/// Holds the remote client and the configuration resolver; stateless across
/// runs apart from the resolver's process-cached deployment layer.
pub struct Warden {
    admin: Arc<dyn RepositoryAdmin>,
    resolver: ConfigResolver,
}

impl Warden {
    pub fn new(admin: Arc<dyn RepositoryAdmin>, resolver: ConfigResolver) -> Self {
        Self { admin, resolver }
    }

    /// Reconciles one repository.
    ///
    /// In dry-run mode the report carries the full ordered list of prospective
    /// actions; in apply mode it carries informational and error entries only.
    ///
    /// # Errors
    ///
    /// Only configuration-resolution failures (document load/parse errors,
    /// sub-organization conflicts) are returned as `Err`; everything else is
    /// captured in the report.
    #[instrument(skip(self), fields(repository = %repo, mode = ?mode))]
    pub async fn sync_repository(
        &self,
        mode: SyncMode,
        repo: &RepoKey,
        git_ref: Option<&str>,
    ) -> SyncResult<SyncReport> {
        self.sync_one(mode, repo, git_ref, None).await
    }

    /// Reconciles one repository with a caller-supplied override layer (the
    /// rename pseudo-config).
    pub async fn sync_repository_with_override(
        &self,
        mode: SyncMode,
        repo: &RepoKey,
        git_ref: Option<&str>,
        override_document: Value,
    ) -> SyncResult<SyncReport> {
        self.sync_one(mode, repo, git_ref, Some(override_document)).await
    }

    /// Reconciles every member repository of one sub-organization.
    #[instrument(skip(self), fields(org = org, suborg = name, mode = ?mode))]
    pub async fn sync_suborg(
        &self,
        mode: SyncMode,
        org: &str,
        name: &str,
        git_ref: Option<&str>,
    ) -> SyncResult<SyncReport> {
        let Some(fragment) = self.resolver.load_suborg_config(name, git_ref).await? else {
            warn!(suborg = name, "No such sub-organization fragment");
            return Ok(SyncReport::default());
        };

        let members = self.resolver.suborg_member_repos(org, &fragment).await?;
        info!(suborg = name, members = members.len(), "Syncing sub-organization");
        self.sync_many(mode, org, members, git_ref).await
    }

    /// Reconciles every repository of the organization.
    ///
    /// Repositories are reconciled concurrently as independent tasks; the only
    /// shared state is the read-only deployment layer inside the resolver.
    #[instrument(skip(self), fields(org = org, mode = ?mode))]
    pub async fn sync_all(
        &self,
        mode: SyncMode,
        org: &str,
        git_ref: Option<&str>,
    ) -> SyncResult<SyncReport> {
        let repos = self
            .admin
            .list_org_repositories(org)
            .await
            .map_err(SyncError::from)?;
        let names: Vec<String> = repos
            .iter()
            .filter_map(|repo| repo["name"].as_str())
            .map(str::to_string)
            .collect();

        info!(org, repositories = names.len(), "Syncing all repositories");
        self.sync_many(mode, org, names, git_ref).await
    }

    /// Reconciles a set of repositories concurrently, converting per-repo
    /// configuration failures into error records so one bad repository cannot
    /// abort the rest.
    async fn sync_many(
        &self,
        mode: SyncMode,
        org: &str,
        names: Vec<String>,
        git_ref: Option<&str>,
    ) -> SyncResult<SyncReport> {
        let runs = names.into_iter().map(|name| {
            let repo = RepoKey::new(org, name);
            async move {
                let result = self.sync_one(mode, &repo, git_ref, None).await;
                (repo, result)
            }
        });

        let mut report = SyncReport::default();
        for (repo, result) in join_all(runs).await {
            match result {
                Ok(repo_report) => report.extend(repo_report),
                Err(e) => {
                    warn!(repository = %repo, error = %e, "Repository sync failed");
                    report
                        .records
                        .push(ChangeRecord::error(DRIVER_PLUGIN, &repo, e.to_string()));
                }
            }
        }
        Ok(report)
    }

    async fn sync_one(
        &self,
        mode: SyncMode,
        repo: &RepoKey,
        git_ref: Option<&str>,
        override_document: Option<Value>,
    ) -> SyncResult<SyncReport> {
        let desired = self.resolver.resolve(repo, git_ref, override_document).await?;

        match self.resolver.check_scope(&desired, &repo.name)? {
            ScopeDecision::InScope => {}
            ScopeDecision::DefaultDenied | ScopeDecision::Restricted => {
                info!(repository = %repo, "Repository is restricted, skipping");
                return Ok(SyncReport::new(vec![ChangeRecord::info(
                    DRIVER_PLUGIN,
                    repo,
                    "repository is restricted from being configured, skipping",
                )]));
            }
            ScopeDecision::ValidatorFailed { pattern } => {
                info!(repository = %repo, pattern, "Repository name fails validator");
                return Ok(SyncReport::new(vec![ChangeRecord::info(
                    DRIVER_PLUGIN,
                    repo,
                    format!("repository name does not match the validator pattern '{pattern}', skipping"),
                )]));
            }
        }

        let executor = Executor::new(self.admin.clone(), mode);
        let mut records = Vec::new();

        for plugin in self.build_plugins(repo, &desired) {
            match plugin.sync(&executor).await {
                Ok(outcome) => {
                    records.extend(outcome.records);
                    if !outcome.should_continue {
                        info!(
                            repository = %repo,
                            plugin = plugin.name(),
                            "Plugin halted the chain for this repository"
                        );
                        break;
                    }
                }
                Err(e @ SyncError::RepositoryVanished { .. }) => {
                    warn!(repository = %repo, error = %e, "Aborting this repository's run");
                    records.push(ChangeRecord::error(plugin.name(), repo, e.to_string()));
                    break;
                }
                Err(e) => {
                    reconciler::capture_error(
                        plugin.name(),
                        repo,
                        &mut records,
                        &e,
                        "running plugin",
                    );
                }
            }
        }

        Ok(SyncReport::new(records))
    }

    /// Builds the plugin chain for one repository, in the fixed driver order.
    /// Collection plugins are only instantiated for sections the configuration
    /// actually mentions.
    fn build_plugins(&self, repo: &RepoKey, desired: &DesiredConfig) -> Vec<Box<dyn plugins::Plugin>> {
        let admin = &self.admin;
        let mut chain: Vec<Box<dyn plugins::Plugin>> = vec![
            Box::new(plugins::Archive::new(repo.clone(), desired.repository.clone())),
            Box::new(plugins::Repository::new(repo.clone(), desired.repository.clone())),
        ];

        if let Some(branches) = &desired.branches {
            chain.push(Box::new(plugins::Branches::new(repo.clone(), branches.clone())));
        }

        if let Some(rulesets) = &desired.rulesets {
            let (org_entries, repo_entries) = split_ruleset_scopes(rulesets);
            chain.push(Box::new(DiffablePlugin(plugins::Rulesets::new(
                admin.clone(),
                repo.clone(),
                repo_entries,
                RulesetScope::Repo,
            ))));
            if !org_entries.is_empty() {
                chain.push(Box::new(DiffablePlugin(plugins::Rulesets::new(
                    admin.clone(),
                    repo.clone(),
                    org_entries,
                    RulesetScope::Org,
                ))));
            }
        }

        if let Some(teams) = &desired.teams {
            chain.push(Box::new(DiffablePlugin(plugins::Teams::new(
                admin.clone(),
                repo.clone(),
                teams.clone(),
                self.resolver.env().create_teams_if_missing,
            ))));
        }

        if let Some(collaborators) = &desired.collaborators {
            chain.push(Box::new(DiffablePlugin(plugins::Collaborators::new(
                admin.clone(),
                repo.clone(),
                collaborators.clone(),
            ))));
        }

        if let Some(environments) = &desired.environments {
            chain.push(Box::new(DiffablePlugin(plugins::Environments::new(
                admin.clone(),
                repo.clone(),
                environments.clone(),
            ))));
        }

        chain
    }
}

/// Splits ruleset entries into (org-scoped, repo-scoped) by their `scope`
/// key, stripping the key so it never reaches the API or the diff.
fn split_ruleset_scopes(entries: &[Value]) -> (Vec<Value>, Vec<Value>) {
    let mut org = Vec::new();
    let mut repo = Vec::new();
    for entry in entries {
        let mut entry = entry.clone();
        let scope = entry
            .as_object_mut()
            .and_then(|map| map.remove("scope"))
            .and_then(|scope| scope.as_str().map(str::to_string));
        match scope.as_deref() {
            Some("org") => org.push(entry),
            _ => repo.push(entry),
        }
    }
    (org, repo)
}

/// Adapter driving a [`Diffable`] resource through the generic engine as a
/// driver-level plugin.
struct DiffablePlugin<T: Diffable>(T);

#[async_trait::async_trait]
impl<T: Diffable> plugins::Plugin for DiffablePlugin<T> {
    fn name(&self) -> &'static str {
        self.0.name()
    }

    async fn sync(&self, executor: &Executor) -> SyncResult<plugins::PluginOutcome> {
        let records = reconcile(&self.0, executor).await;
        Ok(plugins::PluginOutcome::proceed(records))
    }
}
