//! Archival state plugin.
//!
//! A precondition plugin: besides enforcing the desired `archived` flag, its
//! outcome tells the driver whether the remaining plugins should run at all.
//! Configuring an archived repository is meaningless, so the chain stops when
//! the repository is archived and the settings do not request un-archiving.

use super::{Plugin, PluginOutcome};
use crate::errors::{SyncError, SyncResult};
use crate::reconciler::Executor;
use async_trait::async_trait;
use github_client::{ApiCall, RepoKey};
use serde_json::{json, Value};
use tracing::debug;

#[cfg(test)]
#[path = "archive_tests.rs"]
mod tests;

pub struct Archive {
    repo: RepoKey,
    /// The desired repository-metadata block, if any; only its `archived` key
    /// matters here.
    settings: Option<Value>,
}

impl Archive {
    pub fn new(repo: RepoKey, settings: Option<Value>) -> Self {
        Self { repo, settings }
    }

    fn desired_archived(&self) -> Option<bool> {
        self.settings
            .as_ref()
            .and_then(|settings| settings.get("archived"))
            .and_then(Value::as_bool)
    }

    fn patch_call(&self, archived: bool) -> ApiCall {
        ApiCall::patch(
            format!("/repos/{}/{}", self.repo.owner, self.repo.name),
            json!({ "archived": archived }),
        )
    }
}

#[async_trait]
impl Plugin for Archive {
    fn name(&self) -> &'static str {
        "archive"
    }

    async fn sync(&self, executor: &Executor) -> SyncResult<PluginOutcome> {
        let live = match executor.admin().get_repository(&self.repo).await {
            Ok(live) => live,
            Err(github_client::Error::NotFound) => {
                return Err(SyncError::RepositoryVanished {
                    repo: self.repo.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        let live_archived = live["archived"].as_bool().unwrap_or(false);

        let mut records = Vec::new();
        match (self.desired_archived(), live_archived) {
            // Already archived and meant to stay that way: nothing else to do.
            (Some(true), true) | (None, true) => {
                debug!(repository = %self.repo, "Repository is archived, halting plugin chain");
                Ok(PluginOutcome::halt(records))
            }
            (Some(true), false) => {
                executor
                    .apply(
                        self.name(),
                        &self.repo,
                        &mut records,
                        self.patch_call(true),
                        "Archive repository",
                    )
                    .await?;
                Ok(PluginOutcome::halt(records))
            }
            (Some(false), true) => {
                executor
                    .apply(
                        self.name(),
                        &self.repo,
                        &mut records,
                        self.patch_call(false),
                        "Unarchive repository",
                    )
                    .await?;
                Ok(PluginOutcome::proceed(records))
            }
            (Some(false), false) | (None, false) => Ok(PluginOutcome::proceed(records)),
        }
    }
}
