//! Branch protection plugin.
//!
//! Branch entries are not pruned like other collections: only branches named
//! in the configuration are touched, and only their `protection` key is
//! managed. The policies preserved here:
//!
//! - A `protection` value of `null`, `{}`, `[]`, or `false` means "remove
//!   protection".
//! - The literal branch name `default` resolves to the repository's current
//!   default branch at sync time.
//! - When the configuration gives no `required_status_checks`, whatever is
//!   live stays enabled; it is only disabled when nothing is configured live
//!   either.
//! - `enforce_admins`, `required_linear_history`, and `restrictions` are made
//!   explicit (`null` when neither configured nor live) because the update API
//!   requires them.

use super::{Plugin, PluginOutcome};
use crate::change_record::ChangeRecord;
use crate::diff;
use crate::errors::{SyncError, SyncResult};
use crate::reconciler::{self, Executor};
use async_trait::async_trait;
use github_client::{ApiCall, RepoKey};
use serde_json::{json, Value};
use tracing::debug;

#[cfg(test)]
#[path = "branches_tests.rs"]
mod tests;

/// Live protection attributes reported as `{ "enabled": bool }` wrappers,
/// flattened before comparison.
const ENABLED_WRAPPERS: &[&str] = &[
    "required_conversation_resolution",
    "allow_deletions",
    "required_linear_history",
    "enforce_admins",
    "required_signatures",
];

/// Attributes the update API requires to be explicit.
const REQUIRED_ATTRIBUTES: &[&str] = &["enforce_admins", "required_linear_history", "restrictions"];

pub struct Branches {
    repo: RepoKey,
    entries: Vec<Value>,
}

impl Branches {
    pub fn new(repo: RepoKey, entries: Vec<Value>) -> Self {
        Self { repo, entries }
    }

    fn protection_path(&self, branch: &str) -> String {
        format!(
            "/repos/{}/{}/branches/{}/protection",
            self.repo.owner, self.repo.name, branch
        )
    }

    async fn sync_branch(
        &self,
        executor: &Executor,
        records: &mut Vec<ChangeRecord>,
        branch: &str,
        protection: &Value,
    ) -> SyncResult<()> {
        if is_empty_protection(protection) {
            debug!(repository = %self.repo, branch, "Removing branch protection");
            match executor
                .apply(
                    self.name(),
                    &self.repo,
                    records,
                    ApiCall::delete(self.protection_path(branch)),
                    "Delete branch protection",
                )
                .await
            {
                // Nothing to delete remotely.
                Err(SyncError::Transport(github_client::Error::NotFound)) => Ok(()),
                other => other.map(|_| ()),
            }
        } else {
            let live = match executor
                .admin()
                .get_branch_protection(&self.repo, branch)
                .await
            {
                Ok(live) => Some(reformat_protection(live)),
                Err(github_client::Error::NotFound) => None,
                Err(e) => return Err(e.into()),
            };

            let message = match &live {
                Some(live) => {
                    let result = diff::compare(protection, live);
                    if !result.has_changes {
                        debug!(repository = %self.repo, branch, "Branch protection unchanged");
                        return Ok(());
                    }
                    format!(
                        "Update branch protection for '{branch}': {}",
                        result.summary()
                    )
                }
                None => format!("Add branch protection for '{branch}'"),
            };

            let payload = normalize_protection(protection.clone(), live.as_ref());
            executor
                .apply(
                    self.name(),
                    &self.repo,
                    records,
                    ApiCall::put(self.protection_path(branch), payload),
                    message,
                )
                .await?;
            Ok(())
        }
    }
}

#[async_trait]
impl Plugin for Branches {
    fn name(&self) -> &'static str {
        "branches"
    }

    async fn sync(&self, executor: &Executor) -> SyncResult<PluginOutcome> {
        let mut records = Vec::new();
        if self.entries.is_empty() {
            return Ok(PluginOutcome::proceed(records));
        }

        // Needed to resolve the literal branch name `default`.
        let live_repo = match executor.admin().get_repository(&self.repo).await {
            Ok(live_repo) => live_repo,
            Err(github_client::Error::NotFound) => {
                debug!(repository = %self.repo, "Repository not found, skipping branch protection");
                return Ok(PluginOutcome::proceed(records));
            }
            Err(e) => return Err(e.into()),
        };
        let default_branch = live_repo["default_branch"].as_str().unwrap_or("main");

        for entry in &self.entries {
            // Entries without a protection key are not managed at all.
            let Some(protection) = entry.get("protection") else {
                continue;
            };
            let Some(name) = entry["name"].as_str() else {
                records.push(ChangeRecord::error(
                    self.name(),
                    &self.repo,
                    "branch entry without a name",
                ));
                continue;
            };
            let branch = if name == "default" { default_branch } else { name };

            if let Err(e) = self.sync_branch(executor, &mut records, branch, protection).await {
                reconciler::capture_error(
                    self.name(),
                    &self.repo,
                    &mut records,
                    &e,
                    &format!("syncing protection for branch '{branch}'"),
                );
            }
        }

        Ok(PluginOutcome::proceed(records))
    }
}

/// Whether a protection value means "remove protection".
fn is_empty_protection(protection: &Value) -> bool {
    match protection {
        Value::Null => true,
        Value::Bool(enabled) => !enabled,
        Value::Object(map) => map.is_empty(),
        Value::Array(list) => list.is_empty(),
        _ => false,
    }
}

/// Flattens the live protection's `{ "enabled": bool }` wrappers and fills the
/// review-bypass default so live state is comparable with configured state.
fn reformat_protection(mut live: Value) -> Value {
    let Some(map) = live.as_object_mut() else {
        return live;
    };

    for key in ENABLED_WRAPPERS {
        if let Some(wrapper) = map.get(*key) {
            if let Some(enabled) = wrapper.get("enabled") {
                let enabled = enabled.clone();
                map.insert(key.to_string(), enabled);
            }
        }
    }

    if let Some(Value::Object(reviews)) = map.get_mut("required_pull_request_reviews") {
        reviews
            .entry("bypass_pull_request_allowances")
            .or_insert_with(|| json!({ "apps": [], "teams": [], "users": [] }));
    }

    live
}

/// Applies the live-inheritance rules before the protection payload is sent.
///
/// Fields the configuration does not mention inherit the live value; the
/// attributes the API insists on become explicit `null` when nothing is live
/// either.
fn normalize_protection(mut desired: Value, live: Option<&Value>) -> Value {
    let Some(map) = desired.as_object_mut() else {
        return desired;
    };

    if !map.contains_key("required_status_checks") {
        let live_checks = live.and_then(|live| live.get("required_status_checks"));
        match live_checks {
            Some(checks) if !checks.is_null() => {
                map.insert(
                    "required_status_checks".to_string(),
                    json!({ "strict": checks["strict"], "checks": checks["checks"] }),
                );
            }
            _ => {
                map.insert("required_status_checks".to_string(), Value::Null);
            }
        }
    }

    for key in REQUIRED_ATTRIBUTES {
        if !map.contains_key(*key) {
            match live.and_then(|live| live.get(*key)) {
                Some(value) => {
                    map.insert(key.to_string(), value.clone());
                }
                None => {
                    map.insert(key.to_string(), Value::Null);
                }
            }
        }
    }

    desired
}
