//! Repository metadata plugin.
//!
//! Pushes the desired `repository:` block onto the live repository object:
//! feature toggles, merge settings, visibility, default branch, and the name
//! itself (a desired `name` differing from the live one performs a rename,
//! which is how the rename override layer takes effect). Topics are replaced
//! through their dedicated endpoint.
//!
//! Only fields present in the desired block are compared and sent; unmanaged
//! live fields are left alone.

use super::{Plugin, PluginOutcome};
use crate::diff;
use crate::errors::{SyncError, SyncResult};
use crate::reconciler::Executor;
use async_trait::async_trait;
use github_client::{ApiCall, RepoKey};
use serde_json::{json, Map, Value};
use tracing::debug;

#[cfg(test)]
#[path = "repository_tests.rs"]
mod tests;

/// Keys in the repository block that are not part of the PATCH payload.
///
/// `archived` belongs to the archive plugin; `topics` has its own endpoint;
/// `oldname` only exists to locate a renamed repository's config file.
const EXCLUDED_KEYS: &[&str] = &["archived", "topics", "oldname"];

pub struct Repository {
    repo: RepoKey,
    settings: Option<Value>,
}

impl Repository {
    pub fn new(repo: RepoKey, settings: Option<Value>) -> Self {
        Self { repo, settings }
    }

    /// The desired PATCH payload: the configured block minus excluded keys.
    fn patch_payload(&self, settings: &Value) -> Option<Value> {
        let fields: Map<String, Value> = settings
            .as_object()?
            .iter()
            .filter(|(key, _)| !EXCLUDED_KEYS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        if fields.is_empty() {
            None
        } else {
            Some(Value::Object(fields))
        }
    }
}

#[async_trait]
impl Plugin for Repository {
    fn name(&self) -> &'static str {
        "repository"
    }

    async fn sync(&self, executor: &Executor) -> SyncResult<PluginOutcome> {
        let Some(settings) = &self.settings else {
            return Ok(PluginOutcome::proceed(Vec::new()));
        };

        let live = match executor.admin().get_repository(&self.repo).await {
            Ok(live) => live,
            Err(github_client::Error::NotFound) => {
                return Err(SyncError::RepositoryVanished {
                    repo: self.repo.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();

        if let Some(payload) = self.patch_payload(settings) {
            let result = diff::compare(&payload, &live);
            if result.has_changes {
                executor
                    .apply(
                        self.name(),
                        &self.repo,
                        &mut records,
                        ApiCall::patch(
                            format!("/repos/{}/{}", self.repo.owner, self.repo.name),
                            payload,
                        ),
                        format!("Update repository settings: {}", result.summary()),
                    )
                    .await?;
            } else {
                debug!(repository = %self.repo, "Repository settings unchanged");
            }
        }

        if let Some(topics) = settings.get("topics").and_then(Value::as_array) {
            let desired_topics = json!({ "topics": topics });
            let live_topics = json!({ "topics": live.get("topics").cloned().unwrap_or(json!([])) });
            if diff::compare(&desired_topics, &live_topics).has_changes {
                executor
                    .apply(
                        self.name(),
                        &self.repo,
                        &mut records,
                        ApiCall::put(
                            format!("/repos/{}/{}/topics", self.repo.owner, self.repo.name),
                            json!({ "names": topics }),
                        ),
                        "Replace repository topics",
                    )
                    .await?;
            }
        }

        Ok(PluginOutcome::proceed(records))
    }
}
