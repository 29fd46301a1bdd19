//! Tests for the archival state plugin.

use super::*;
use crate::reconciler::SyncMode;
use crate::test_support::MockAdmin;
use std::sync::Arc;

fn repo() -> RepoKey {
    RepoKey::new("acme", "widgets")
}

fn executor(admin: Arc<MockAdmin>, mode: SyncMode) -> Executor {
    Executor::new(admin, mode)
}

/// An unarchived repository with no archived setting proceeds untouched.
#[tokio::test]
async fn test_unarchived_without_setting_proceeds() {
    let admin = Arc::new(MockAdmin::new().with_repository(json!({ "archived": false })));
    let plugin = Archive::new(repo(), None);

    let outcome = plugin.sync(&executor(admin, SyncMode::DryRun)).await.unwrap();

    assert!(outcome.should_continue);
    assert!(outcome.records.is_empty());
}

/// An archived repository with no archived setting halts the plugin chain.
#[tokio::test]
async fn test_archived_without_setting_halts() {
    let admin = Arc::new(MockAdmin::new().with_repository(json!({ "archived": true })));
    let plugin = Archive::new(repo(), None);

    let outcome = plugin.sync(&executor(admin, SyncMode::DryRun)).await.unwrap();

    assert!(!outcome.should_continue);
    assert!(outcome.records.is_empty());
}

/// Archiving an active repository records the PATCH and halts.
#[tokio::test]
async fn test_archiving_records_patch_and_halts() {
    let admin = Arc::new(MockAdmin::new().with_repository(json!({ "archived": false })));
    let plugin = Archive::new(repo(), Some(json!({ "archived": true })));

    let outcome = plugin.sync(&executor(admin, SyncMode::DryRun)).await.unwrap();

    assert!(!outcome.should_continue);
    assert_eq!(outcome.records.len(), 1);
    let action = outcome.records[0].action.as_ref().unwrap();
    assert_eq!(action.to_string(), "PATCH /repos/acme/widgets");
    assert_eq!(action.body.as_ref().unwrap()["archived"], true);
}

/// Unarchiving dispatches the PATCH in apply mode and lets the chain continue.
#[tokio::test]
async fn test_unarchiving_continues() {
    let admin = Arc::new(MockAdmin::new().with_repository(json!({ "archived": true })));
    let plugin = Archive::new(repo(), Some(json!({ "archived": false })));

    let outcome = plugin
        .sync(&executor(admin.clone(), SyncMode::Apply))
        .await
        .unwrap();

    assert!(outcome.should_continue);
    let mutations = admin.mutations();
    assert_eq!(mutations.len(), 1);
    assert_eq!(mutations[0].body.as_ref().unwrap()["archived"], false);
}

/// A vanished repository aborts this repository's run.
#[tokio::test]
async fn test_vanished_repository() {
    let admin = Arc::new(MockAdmin::new());
    let plugin = Archive::new(repo(), None);

    let result = plugin.sync(&executor(admin, SyncMode::DryRun)).await;

    assert!(matches!(result, Err(SyncError::RepositoryVanished { .. })));
}
