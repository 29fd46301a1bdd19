//! Ruleset plugin.
//!
//! Rulesets are reconciled at either repository or organization scope; the two
//! differ only in endpoint paths and in which `source_type` the plugin manages.
//! Matching is by ruleset name; change detection is the structural diff.
//!
//! `required_status_checks` values may carry the externally-defined sentinel.
//! They are resolved through the override resolver before any payload is
//! built — against the matched live ruleset on update, against nothing on
//! create (where the API accepts a single override only, a constraint the
//! resolver enforces via [`OverrideContext::Create`]).

use crate::change_record::ChangeRecord;
use crate::diff;
use crate::errors::SyncResult;
use crate::overrides::{self, OverrideContext, OverrideDirective, ValueKind};
use crate::reconciler::{Diffable, Executor};
use async_trait::async_trait;
use github_client::{ApiCall, RepoKey, RepositoryAdmin, RulesetScope};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

#[cfg(test)]
#[path = "rulesets_tests.rs"]
mod tests;

/// Fields eligible for externally-defined overrides.
fn override_directives() -> Vec<OverrideDirective> {
    vec![OverrideDirective::empty_value(
        "required_status_checks",
        ValueKind::Array,
    )]
}

pub struct Rulesets {
    admin: Arc<dyn RepositoryAdmin>,
    repo: RepoKey,
    entries: Vec<Value>,
    scope: RulesetScope,
}

impl Rulesets {
    pub fn new(
        admin: Arc<dyn RepositoryAdmin>,
        repo: RepoKey,
        entries: Vec<Value>,
        scope: RulesetScope,
    ) -> Self {
        Self {
            admin,
            repo,
            entries,
            scope,
        }
    }

    fn base_path(&self) -> String {
        self.scope.base_path(&self.repo)
    }

    fn id_path(&self, existing: &Value) -> String {
        format!("{}/{}", self.base_path(), existing["id"])
    }
}

#[async_trait]
impl Diffable for Rulesets {
    fn name(&self) -> &'static str {
        "rulesets"
    }

    fn repo(&self) -> &RepoKey {
        &self.repo
    }

    fn desired_entries(&self) -> &[Value] {
        &self.entries
    }

    async fn fetch_existing(&self) -> SyncResult<Vec<Value>> {
        debug!(repository = %self.repo, scope = ?self.scope, "Fetching rulesets");
        Ok(self.admin.list_rulesets(&self.repo, self.scope).await?)
    }

    fn matches(&self, existing: &Value, desired: &Value) -> bool {
        existing["name"] == desired["name"]
    }

    fn has_changed(&self, existing: &Value, desired: &Value) -> bool {
        diff::compare(desired, existing).has_changes
    }

    async fn create(
        &self,
        executor: &Executor,
        records: &mut Vec<ChangeRecord>,
        desired: &Value,
    ) -> SyncResult<()> {
        let payload = overrides::resolve(
            &override_directives(),
            desired,
            &json!({}),
            OverrideContext::Create,
        )?;
        executor
            .apply(
                self.name(),
                &self.repo,
                records,
                ApiCall::post(self.base_path(), payload),
                format!("Create ruleset '{}'", name_of(desired)),
            )
            .await?;
        Ok(())
    }

    async fn update(
        &self,
        executor: &Executor,
        records: &mut Vec<ChangeRecord>,
        existing: &Value,
        desired: &Value,
    ) -> SyncResult<()> {
        let resolved = overrides::resolve(
            &override_directives(),
            desired,
            existing,
            OverrideContext::Update,
        )?;
        let summary = diff::compare(&resolved, existing).summary();

        let mut payload = resolved;
        if let Some(map) = payload.as_object_mut() {
            map.insert("id".to_string(), existing["id"].clone());
        }

        executor
            .apply(
                self.name(),
                &self.repo,
                records,
                ApiCall::put(self.id_path(existing), payload),
                format!("Update ruleset '{}': {summary}", name_of(desired)),
            )
            .await?;
        Ok(())
    }

    async fn remove(
        &self,
        executor: &Executor,
        records: &mut Vec<ChangeRecord>,
        existing: &Value,
    ) -> SyncResult<()> {
        executor
            .apply(
                self.name(),
                &self.repo,
                records,
                ApiCall::delete(self.id_path(existing)),
                format!("Delete ruleset '{}'", name_of(existing)),
            )
            .await?;
        Ok(())
    }
}

fn name_of(entry: &Value) -> &str {
    entry["name"].as_str().unwrap_or("<unnamed>")
}
