//! Tests for change records.

use super::*;
use serde_json::json;

fn repo() -> RepoKey {
    RepoKey::new("acme", "widgets")
}

/// Verify a planned record carries the call and INFO severity.
#[test]
fn test_planned_record() {
    let call = ApiCall::put("/repos/acme/widgets/topics", json!({ "names": ["rust"] }));
    let record = ChangeRecord::planned("repository", &repo(), call.clone(), "Replace topics");

    assert_eq!(record.severity, Severity::Info);
    assert_eq!(record.action, Some(call));
    assert_eq!(record.plugin, "repository");
}

/// Verify error records have no action and ERROR severity.
#[test]
fn test_error_record() {
    let record = ChangeRecord::error("teams", &repo(), "API request failed");

    assert_eq!(record.severity, Severity::Error);
    assert!(record.action.is_none());
}

/// Verify display includes severity, plugin, repository, and the call.
#[test]
fn test_display_format() {
    let record = ChangeRecord::planned(
        "branches",
        &repo(),
        ApiCall::delete("/repos/acme/widgets/branches/main/protection"),
        "Delete branch protection",
    );

    let rendered = record.to_string();
    assert!(rendered.starts_with("[INFO] branches acme/widgets:"));
    assert!(rendered.contains("DELETE /repos/acme/widgets/branches/main/protection"));
}

/// Verify report error detection and extension preserve order.
#[test]
fn test_report_errors_and_extend() {
    let mut report = SyncReport::new(vec![ChangeRecord::info("archive", &repo(), "skipped")]);
    assert!(!report.has_errors());

    report.extend(SyncReport::new(vec![ChangeRecord::error(
        "teams",
        &repo(),
        "boom",
    )]));

    assert!(report.has_errors());
    assert_eq!(report.records.len(), 2);
    assert_eq!(report.records[0].plugin, "archive");
}
