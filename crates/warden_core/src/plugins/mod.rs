//! Resource plugins.
//!
//! One plugin per resource kind, each supplying only the resource-specific
//! primitives. Collection-shaped plugins implement
//! [`Diffable`](crate::reconciler::Diffable) and are driven by the generic
//! engine; `archive` and `repository` have their own small sync flows because
//! their resources are singletons, not collections.
//!
//! The driver runs plugins in a fixed order: archive first (an archived
//! repository short-circuits everything else), then repository metadata,
//! branches, rulesets, teams, collaborators, environments.

use crate::change_record::ChangeRecord;
use crate::errors::SyncResult;
use crate::reconciler::Executor;
use async_trait::async_trait;

pub mod archive;
pub mod branches;
pub mod collaborators;
pub mod environments;
pub mod repository;
pub mod rulesets;
pub mod teams;

pub use archive::Archive;
pub use branches::Branches;
pub use collaborators::Collaborators;
pub use environments::Environments;
pub use repository::Repository;
pub use rulesets::Rulesets;
pub use teams::Teams;

/// The result of one plugin's sync pass.
#[derive(Debug, Default)]
pub struct PluginOutcome {
    /// Records accumulated by the plugin.
    pub records: Vec<ChangeRecord>,

    /// When false, the remaining plugins for this repository are skipped
    /// (archival short-circuit).
    pub should_continue: bool,
}

impl PluginOutcome {
    pub fn proceed(records: Vec<ChangeRecord>) -> Self {
        Self {
            records,
            should_continue: true,
        }
    }

    pub fn halt(records: Vec<ChangeRecord>) -> Self {
        Self {
            records,
            should_continue: false,
        }
    }
}

/// A resource plugin as seen by the reconciliation driver.
#[async_trait]
pub trait Plugin: Send + Sync {
    fn name(&self) -> &'static str;

    /// Runs the plugin's sync pass in the executor's mode.
    async fn sync(&self, executor: &Executor) -> SyncResult<PluginOutcome>;
}
