//! The generic diffable reconciliation engine.
//!
//! Every collection-shaped resource kind (rulesets, teams, collaborators,
//! environments) is driven by the same algorithm: fetch the existing
//! collection, match desired entries to existing ones with the plugin's
//! comparator, then remove unmatched existing entries, create unmatched
//! desired entries, and update matched pairs the plugin reports as changed.
//! Plugins supply only those resource-specific primitives; the engine owns
//! ordering, error capture, and the dry-run/live split.
//!
//! Execution mode is threaded through an [`Executor`] rather than forked into
//! per-plugin code paths: plugins describe each mutation as an
//! [`ApiCall`](github_client::ApiCall), and the executor either records it
//! (dry-run) or dispatches it (live). Both modes therefore walk exactly the
//! same code.

use crate::change_record::ChangeRecord;
use crate::errors::{SyncError, SyncResult};
use async_trait::async_trait;
use github_client::{ApiCall, RepoKey, RepositoryAdmin};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info};

#[cfg(test)]
#[path = "reconciler_tests.rs"]
mod tests;

/// Execution mode for a reconciliation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Compute and record every action without mutating remote state.
    DryRun,
    /// Dispatch mutations against the remote API.
    Apply,
}

/// Dispatches or records described mutations, depending on mode.
#[derive(Clone)]
pub struct Executor {
    admin: Arc<dyn RepositoryAdmin>,
    mode: SyncMode,
}

impl Executor {
    pub fn new(admin: Arc<dyn RepositoryAdmin>, mode: SyncMode) -> Self {
        Self { admin, mode }
    }

    pub fn mode(&self) -> SyncMode {
        self.mode
    }

    pub fn is_dry_run(&self) -> bool {
        self.mode == SyncMode::DryRun
    }

    /// The client, for plugins that need reads beyond the typed helpers.
    pub fn admin(&self) -> &Arc<dyn RepositoryAdmin> {
        &self.admin
    }

    /// Applies one described mutation.
    ///
    /// In dry-run mode the call is recorded and nothing is dispatched; in live
    /// mode the call is dispatched and its response returned.
    pub async fn apply(
        &self,
        plugin: &'static str,
        repo: &RepoKey,
        records: &mut Vec<ChangeRecord>,
        call: ApiCall,
        message: impl Into<String>,
    ) -> SyncResult<Option<Value>> {
        let message = message.into();
        match self.mode {
            SyncMode::DryRun => {
                records.push(ChangeRecord::planned(plugin, repo, call, message));
                Ok(None)
            }
            SyncMode::Apply => {
                info!(plugin, repository = %repo, call = %call, "{}", message);
                let response = self.admin.request(&call).await?;
                Ok(Some(response))
            }
        }
    }
}

/// A collection-shaped resource kind driven by [`reconcile`].
///
/// Implementations supply the resource-specific primitives; the engine never
/// inspects entry contents beyond handing them back to these methods.
#[async_trait]
pub trait Diffable: Send + Sync {
    /// Plugin name, used on change records.
    fn name(&self) -> &'static str;

    /// The repository being reconciled.
    fn repo(&self) -> &RepoKey;

    /// The desired entries from the resolved configuration.
    fn desired_entries(&self) -> &[Value];

    /// Fetches the existing collection. `Error::NotFound` is handled by the
    /// engine as "no existing resources".
    async fn fetch_existing(&self) -> SyncResult<Vec<Value>>;

    /// Whether an existing resource corresponds to a desired entry.
    fn matches(&self, existing: &Value, desired: &Value) -> bool;

    /// Whether a matched pair differs enough to need an update.
    fn has_changed(&self, existing: &Value, desired: &Value) -> bool;

    /// Whether an existing resource is managed by this system at all.
    /// Unmanaged resources (e.g. security-manager teams) are invisible to
    /// matching and removal.
    fn is_managed(&self, _existing: &Value) -> bool {
        true
    }

    /// Whether existing resources with no matching desired entry are removed.
    /// Plugins that only push forward managed entries (branch protection)
    /// return false.
    fn prunes_unmatched(&self) -> bool {
        true
    }

    /// Creates a desired entry that has no existing counterpart.
    async fn create(
        &self,
        executor: &Executor,
        records: &mut Vec<ChangeRecord>,
        desired: &Value,
    ) -> SyncResult<()>;

    /// Updates a matched pair that has changed.
    async fn update(
        &self,
        executor: &Executor,
        records: &mut Vec<ChangeRecord>,
        existing: &Value,
        desired: &Value,
    ) -> SyncResult<()>;

    /// Removes an existing resource with no matching desired entry.
    async fn remove(
        &self,
        executor: &Executor,
        records: &mut Vec<ChangeRecord>,
        existing: &Value,
    ) -> SyncResult<()>;
}

/// Runs the generic reconciliation algorithm for one resource kind.
///
/// Per-resource errors are captured as `ERROR`-severity records (and logged in
/// live mode); they never abort sibling resources. Removals are issued before
/// creates and updates within the resource kind.
pub async fn reconcile(plugin: &dyn Diffable, executor: &Executor) -> Vec<ChangeRecord> {
    let mut records = Vec::new();
    let repo = plugin.repo().clone();

    let existing = match plugin.fetch_existing().await {
        Ok(existing) => existing,
        Err(SyncError::Transport(github_client::Error::NotFound)) => {
            debug!(plugin = plugin.name(), repository = %repo, "Nothing exists remotely");
            Vec::new()
        }
        Err(e) => {
            capture_error(plugin.name(), &repo, &mut records, &e, "fetching existing state");
            return records;
        }
    };

    let existing: Vec<Value> = existing
        .into_iter()
        .filter(|resource| plugin.is_managed(resource))
        .collect();
    let desired = plugin.desired_entries();

    debug!(
        plugin = plugin.name(),
        repository = %repo,
        existing = existing.len(),
        desired = desired.len(),
        "Reconciling resource collection"
    );

    if plugin.prunes_unmatched() {
        for resource in &existing {
            if !desired.iter().any(|entry| plugin.matches(resource, entry)) {
                if let Err(e) = plugin.remove(executor, &mut records, resource).await {
                    capture_error(plugin.name(), &repo, &mut records, &e, "removing resource");
                }
            }
        }
    }

    for entry in desired {
        let matched = existing.iter().find(|resource| plugin.matches(resource, entry));
        let result = match matched {
            None => plugin.create(executor, &mut records, entry).await,
            Some(resource) if plugin.has_changed(resource, entry) => {
                plugin.update(executor, &mut records, resource, entry).await
            }
            Some(_) => Ok(()),
        };
        if let Err(e) = result {
            capture_error(plugin.name(), &repo, &mut records, &e, "applying desired entry");
        }
    }

    records
}

/// Converts a per-resource error into an `ERROR` record, logging it in live
/// runs.
pub(crate) fn capture_error(
    plugin: &'static str,
    repo: &RepoKey,
    records: &mut Vec<ChangeRecord>,
    error: &SyncError,
    context: &str,
) {
    error!(plugin, repository = %repo, error = %error, "Error while {}", context);
    records.push(ChangeRecord::error(
        plugin,
        repo,
        format!("error while {context}: {error}"),
    ));
}
