//! Team access plugin.
//!
//! Reconciles which teams have access to the repository and at what
//! permission. Teams are matched by slug; the repository permission is the
//! only mutable attribute. Security-manager teams are excluded from
//! comparison entirely — they are granted access through the security-manager
//! role and must not be added or removed here.
//!
//! A desired team that does not exist in the organization is created first
//! when team auto-creation is enabled; otherwise it is surfaced as an error.

use crate::change_record::ChangeRecord;
use crate::errors::SyncResult;
use crate::reconciler::{Diffable, Executor};
use async_trait::async_trait;
use github_client::{ApiCall, RepoKey, RepositoryAdmin};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

#[cfg(test)]
#[path = "teams_tests.rs"]
mod tests;

pub struct Teams {
    admin: Arc<dyn RepositoryAdmin>,
    repo: RepoKey,
    entries: Vec<Value>,
    create_if_missing: bool,
}

impl Teams {
    pub fn new(
        admin: Arc<dyn RepositoryAdmin>,
        repo: RepoKey,
        entries: Vec<Value>,
        create_if_missing: bool,
    ) -> Self {
        Self {
            admin,
            repo,
            entries,
            create_if_missing,
        }
    }

    fn team_repo_path(&self, slug: &str) -> String {
        format!(
            "/orgs/{}/teams/{}/repos/{}/{}",
            self.repo.owner, slug, self.repo.owner, self.repo.name
        )
    }

    /// Grants (or updates) the team's repository permission.
    async fn put_permission(
        &self,
        executor: &Executor,
        records: &mut Vec<ChangeRecord>,
        slug: &str,
        desired: &Value,
    ) -> SyncResult<()> {
        executor
            .apply(
                self.name(),
                &self.repo,
                records,
                ApiCall::put(
                    self.team_repo_path(slug),
                    json!({ "permission": desired["permission"] }),
                ),
                format!("Add team '{slug}' to repository"),
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Diffable for Teams {
    fn name(&self) -> &'static str {
        "teams"
    }

    fn repo(&self) -> &RepoKey {
        &self.repo
    }

    fn desired_entries(&self) -> &[Value] {
        &self.entries
    }

    async fn fetch_existing(&self) -> SyncResult<Vec<Value>> {
        let teams = self.admin.list_repository_teams(&self.repo).await?;

        // Security-manager teams are not handled here; filter them out before
        // any matching happens.
        let security = match self
            .admin
            .list_security_manager_teams(&self.repo.owner)
            .await
        {
            Ok(security) => security,
            Err(github_client::Error::NotFound) => {
                debug!(
                    org = %self.repo.owner,
                    "Organization has no security-manager teams configured"
                );
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };

        Ok(teams
            .into_iter()
            .filter(|team| !security.iter().any(|sec| sec["name"] == team["name"]))
            .collect())
    }

    fn matches(&self, existing: &Value, desired: &Value) -> bool {
        existing["slug"] == desired["name"]
    }

    fn has_changed(&self, existing: &Value, desired: &Value) -> bool {
        existing["permission"] != desired["permission"]
    }

    async fn create(
        &self,
        executor: &Executor,
        records: &mut Vec<ChangeRecord>,
        desired: &Value,
    ) -> SyncResult<()> {
        let Some(slug) = desired["name"].as_str() else {
            records.push(ChangeRecord::error(
                self.name(),
                &self.repo,
                "team entry without a name",
            ));
            return Ok(());
        };

        match self.admin.get_team(&self.repo.owner, slug).await {
            Ok(_) => self.put_permission(executor, records, slug, desired).await,
            Err(github_client::Error::NotFound) if self.create_if_missing => {
                let mut create_body = json!({ "name": desired["name"] });
                if let Some(privacy) = desired.get("privacy") {
                    create_body["privacy"] = privacy.clone();
                }
                executor
                    .apply(
                        self.name(),
                        &self.repo,
                        records,
                        ApiCall::post(format!("/orgs/{}/teams", self.repo.owner), create_body),
                        format!("Create team '{slug}'"),
                    )
                    .await?;
                self.put_permission(executor, records, slug, desired).await
            }
            Err(github_client::Error::NotFound) => {
                records.push(ChangeRecord::error(
                    self.name(),
                    &self.repo,
                    format!("team '{slug}' does not exist and team creation is disabled"),
                ));
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update(
        &self,
        executor: &Executor,
        records: &mut Vec<ChangeRecord>,
        existing: &Value,
        desired: &Value,
    ) -> SyncResult<()> {
        let slug = existing["slug"].as_str().unwrap_or_default();
        self.put_permission(executor, records, slug, desired).await
    }

    async fn remove(
        &self,
        executor: &Executor,
        records: &mut Vec<ChangeRecord>,
        existing: &Value,
    ) -> SyncResult<()> {
        let slug = existing["slug"].as_str().unwrap_or_default();
        executor
            .apply(
                self.name(),
                &self.repo,
                records,
                ApiCall::delete(self.team_repo_path(slug)),
                format!("Remove team '{slug}' from repository"),
            )
            .await?;
        Ok(())
    }
}
