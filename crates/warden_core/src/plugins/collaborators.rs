//! Collaborator plugin.
//!
//! Reconciles direct collaborators and their permission. Usernames are
//! compared case-insensitively (GitHub logins are case-preserving but not
//! case-sensitive); the permission is the only mutable attribute. Adding and
//! updating are the same PUT, so both paths share it.

use crate::change_record::ChangeRecord;
use crate::errors::SyncResult;
use crate::reconciler::{Diffable, Executor};
use async_trait::async_trait;
use github_client::{ApiCall, RepoKey, RepositoryAdmin};
use serde_json::{json, Value};
use std::sync::Arc;

#[cfg(test)]
#[path = "collaborators_tests.rs"]
mod tests;

pub struct Collaborators {
    admin: Arc<dyn RepositoryAdmin>,
    repo: RepoKey,
    entries: Vec<Value>,
}

impl Collaborators {
    pub fn new(admin: Arc<dyn RepositoryAdmin>, repo: RepoKey, entries: Vec<Value>) -> Self {
        Self { admin, repo, entries }
    }

    fn collaborator_path(&self, username: &str) -> String {
        format!(
            "/repos/{}/{}/collaborators/{}",
            self.repo.owner, self.repo.name, username
        )
    }

    async fn put_permission(
        &self,
        executor: &Executor,
        records: &mut Vec<ChangeRecord>,
        desired: &Value,
    ) -> SyncResult<()> {
        let username = desired["username"].as_str().unwrap_or_default();
        executor
            .apply(
                self.name(),
                &self.repo,
                records,
                ApiCall::put(
                    self.collaborator_path(username),
                    json!({ "permission": desired["permission"] }),
                ),
                format!("Add collaborator '{username}'"),
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Diffable for Collaborators {
    fn name(&self) -> &'static str {
        "collaborators"
    }

    fn repo(&self) -> &RepoKey {
        &self.repo
    }

    fn desired_entries(&self) -> &[Value] {
        &self.entries
    }

    async fn fetch_existing(&self) -> SyncResult<Vec<Value>> {
        Ok(self.admin.list_collaborators(&self.repo).await?)
    }

    fn matches(&self, existing: &Value, desired: &Value) -> bool {
        match (existing["login"].as_str(), desired["username"].as_str()) {
            (Some(login), Some(username)) => login.eq_ignore_ascii_case(username),
            _ => false,
        }
    }

    fn has_changed(&self, existing: &Value, desired: &Value) -> bool {
        existing_permission(existing) != desired["permission"].as_str().unwrap_or_default()
    }

    async fn create(
        &self,
        executor: &Executor,
        records: &mut Vec<ChangeRecord>,
        desired: &Value,
    ) -> SyncResult<()> {
        self.put_permission(executor, records, desired).await
    }

    async fn update(
        &self,
        executor: &Executor,
        records: &mut Vec<ChangeRecord>,
        _existing: &Value,
        desired: &Value,
    ) -> SyncResult<()> {
        self.put_permission(executor, records, desired).await
    }

    async fn remove(
        &self,
        executor: &Executor,
        records: &mut Vec<ChangeRecord>,
        existing: &Value,
    ) -> SyncResult<()> {
        let username = existing["login"].as_str().unwrap_or_default();
        executor
            .apply(
                self.name(),
                &self.repo,
                records,
                ApiCall::delete(self.collaborator_path(username)),
                format!("Remove collaborator '{username}'"),
            )
            .await?;
        Ok(())
    }
}

/// The effective permission of a live collaborator.
///
/// Newer API responses carry `role_name`; older ones only the `permissions`
/// flag object.
fn existing_permission(existing: &Value) -> &str {
    if let Some(role) = existing["role_name"].as_str() {
        return role;
    }
    let permissions = &existing["permissions"];
    if permissions["admin"] == true {
        "admin"
    } else if permissions["maintain"] == true {
        "maintain"
    } else if permissions["push"] == true {
        "push"
    } else if permissions["triage"] == true {
        "triage"
    } else {
        "pull"
    }
}
