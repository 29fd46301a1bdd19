//! Tests for externally-defined override resolution.

use super::*;
use serde_json::json;

fn status_checks_directive() -> OverrideDirective {
    OverrideDirective::empty_value("required_status_checks", ValueKind::Array)
}

/// Verify the sentinel is replaced with the first existing value for the field.
#[test]
fn test_sentinel_takes_existing_value() {
    let desired = json!({
        "name": "base",
        "rules": [{ "required_status_checks": EXTERNALLY_DEFINED }],
    });
    let existing = json!({
        "name": "base",
        "rules": [{ "required_status_checks": [{ "context": "custom-1" }, { "context": "custom-2" }] }],
    });

    let resolved = resolve(
        &[status_checks_directive()],
        &desired,
        &existing,
        OverrideContext::Update,
    )
    .unwrap();

    assert_eq!(
        resolved["rules"][0]["required_status_checks"],
        json!([{ "context": "custom-1" }, { "context": "custom-2" }])
    );
}

/// Verify the emptyValue fallback produces [] for an array-kind directive and
/// leaves the parent structure otherwise untouched.
#[test]
fn test_missing_existing_empty_array() {
    let desired = json!({
        "name": "base",
        "rules": [{ "type": "required_status_checks", "required_status_checks": EXTERNALLY_DEFINED }],
    });

    let resolved = resolve(
        &[status_checks_directive()],
        &desired,
        &json!({}),
        OverrideContext::Update,
    )
    .unwrap();

    assert_eq!(resolved["rules"][0]["required_status_checks"], json!([]));
    assert_eq!(resolved["rules"][0]["type"], "required_status_checks");
    assert_eq!(resolved["name"], "base");
}

/// Verify object- and scalar-kind fallbacks produce {} and "".
#[test]
fn test_missing_existing_other_kinds() {
    let desired = json!({ "conditions": EXTERNALLY_DEFINED, "note": EXTERNALLY_DEFINED });
    let directives = [
        OverrideDirective::empty_value("conditions", ValueKind::Object),
        OverrideDirective::empty_value("note", ValueKind::Scalar),
    ];

    let resolved = resolve(&directives, &desired, &json!({}), OverrideContext::Update).unwrap();

    assert_eq!(resolved["conditions"], json!({}));
    assert_eq!(resolved["note"], json!(""));
}

/// Verify multiple occurrences resolve independently against the FIRST
/// matching existing entry — the remote API retains only the most recent
/// externally-set value.
#[test]
fn test_multiple_occurrences_use_first_existing() {
    let desired = json!({
        "rules": [
            { "required_status_checks": EXTERNALLY_DEFINED },
            { "required_status_checks": EXTERNALLY_DEFINED },
        ],
    });
    let existing = json!({
        "rules": [{ "required_status_checks": [{ "context": "kept" }] }],
    });

    let resolved = resolve(
        &[status_checks_directive()],
        &desired,
        &existing,
        OverrideContext::Update,
    )
    .unwrap();

    assert_eq!(resolved["rules"][0]["required_status_checks"], json!([{ "context": "kept" }]));
    assert_eq!(resolved["rules"][1]["required_status_checks"], json!([{ "context": "kept" }]));
}

/// Verify the delete fallback removes the field and prunes the configured
/// number of ancestor levels.
#[test]
fn test_delete_prunes_ancestors() {
    let desired = json!({
        "name": "base",
        "rules": [
            { "type": "required_status_checks", "required_status_checks": EXTERNALLY_DEFINED },
            { "type": "deletion" },
        ],
    });

    // Depth 1: remove the rule block that contained the field.
    let resolved = resolve(
        &[OverrideDirective::delete("required_status_checks", 1)],
        &desired,
        &json!({}),
        OverrideContext::Update,
    )
    .unwrap();

    assert_eq!(resolved["rules"], json!([{ "type": "deletion" }]));
    assert_eq!(resolved["name"], "base");
}

/// Verify depth 0 removes only the field itself.
#[test]
fn test_delete_depth_zero_removes_field_only() {
    let desired = json!({
        "rules": [{ "type": "x", "required_status_checks": EXTERNALLY_DEFINED }],
    });

    let resolved = resolve(
        &[OverrideDirective::delete("required_status_checks", 0)],
        &desired,
        &json!({}),
        OverrideContext::Update,
    )
    .unwrap();

    assert_eq!(resolved["rules"], json!([{ "type": "x" }]));
}

/// Verify an unrecognized value kind with no existing counterpart surfaces as
/// an error, not a silent skip.
#[test]
fn test_unknown_value_kind_errors() {
    let desired = json!({ "custom_field": EXTERNALLY_DEFINED });
    let directives = [OverrideDirective {
        field: "custom_field".to_string(),
        value_kind: ValueKind::Other("tuple".to_string()),
        on_missing: OnMissing::EmptyValue,
        delete_depth: 0,
    }];

    let err = resolve(&directives, &desired, &json!({}), OverrideContext::Update).unwrap_err();

    assert!(matches!(err, SyncError::OverrideResolution { ref field, .. } if field == "custom_field"));
}

/// Verify the same unknown kind resolves fine when an existing value is there
/// to take.
#[test]
fn test_unknown_value_kind_with_existing_value_is_fine() {
    let desired = json!({ "custom_field": EXTERNALLY_DEFINED });
    let existing = json!({ "custom_field": 42 });
    let directives = [OverrideDirective {
        field: "custom_field".to_string(),
        value_kind: ValueKind::Other("tuple".to_string()),
        on_missing: OnMissing::EmptyValue,
        delete_depth: 0,
    }];

    let resolved = resolve(&directives, &desired, &existing, OverrideContext::Update).unwrap();

    assert_eq!(resolved["custom_field"], 42);
}

/// Verify create context rejects a document with two sentinel occurrences.
#[test]
fn test_create_context_allows_one_override_only() {
    let desired = json!({
        "rules": [
            { "required_status_checks": EXTERNALLY_DEFINED },
            { "required_status_checks": EXTERNALLY_DEFINED },
        ],
    });

    let err = resolve(
        &[status_checks_directive()],
        &desired,
        &json!({}),
        OverrideContext::Create,
    )
    .unwrap_err();
    assert!(matches!(err, SyncError::OverrideResolution { .. }));

    // One occurrence is fine.
    let single = json!({ "rules": [{ "required_status_checks": EXTERNALLY_DEFINED }] });
    assert!(resolve(
        &[status_checks_directive()],
        &single,
        &json!({}),
        OverrideContext::Create,
    )
    .is_ok());
}

/// Verify documents without the sentinel pass through untouched.
#[test]
fn test_no_sentinel_is_identity() {
    let desired = json!({ "rules": [{ "required_status_checks": [{ "context": "ci" }] }] });

    let resolved = resolve(
        &[status_checks_directive()],
        &desired,
        &json!({}),
        OverrideContext::Update,
    )
    .unwrap();

    assert_eq!(resolved, desired);
}

/// Verify directive parsing from a configuration document.
#[test]
fn test_directives_from_document() {
    let document = json!({
        "overrides": {
            "required_status_checks": { "type": "array" },
            "conditions": { "type": "dict" },
            "stale_rule": { "action": "delete", "parents": 2 },
        },
    });

    let directives = OverrideDirective::from_document(&document);

    assert_eq!(directives.len(), 3);
    let rsc = directives.iter().find(|d| d.field == "required_status_checks").unwrap();
    assert_eq!(rsc.value_kind, ValueKind::Array);
    let stale = directives.iter().find(|d| d.field == "stale_rule").unwrap();
    assert_eq!(stale.on_missing, OnMissing::Delete);
    assert_eq!(stale.delete_depth, 2);
}
