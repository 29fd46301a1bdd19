//! Tests for repository scope restrictions.

use super::*;
use serde_json::json;

/// Verify exclude semantics: literals and regexes restrict, near-misses don't.
#[test]
fn test_exclude_patterns() {
    let rules = RestrictedRepos {
        include: vec![],
        exclude: vec![
            "foo".to_string(),
            ".*-test$".to_string(),
            "^personal-.*$".to_string(),
        ],
    };

    assert!(rules.is_restricted("foo"));
    assert!(rules.is_restricted("my-repo-test"));
    assert!(rules.is_restricted("personal-repo"));
    assert!(!rules.is_restricted("my-repo-test-data"));
    assert!(!rules.is_restricted("personalization-repo"));
}

/// Verify include semantics: only matching names are in scope.
#[test]
fn test_include_patterns() {
    let rules = RestrictedRepos {
        include: vec!["foo".to_string(), ".*-test$".to_string()],
        exclude: vec![],
    };

    assert!(!rules.is_restricted("foo"));
    assert!(!rules.is_restricted("my-repo-test"));
    assert!(rules.is_restricted("my-repo-test-data"));
}

/// Verify no rules means nothing is restricted.
#[test]
fn test_empty_rules_restrict_nothing() {
    let rules = RestrictedRepos::default();
    assert!(!rules.is_restricted("my-repo"));
    assert!(!rules.is_restricted("another-repo"));
}

/// Verify the object document form parses include and exclude.
#[test]
fn test_from_document_object_form() {
    let rules = RestrictedRepos::from_document(&json!({
        "restrictedRepos": { "exclude": ["foo"] }
    }));

    assert!(rules.is_restricted("foo"));
    assert!(!rules.is_restricted("bar"));
}

/// Verify the deployment fallback list form is treated as an exclude list.
#[test]
fn test_from_document_list_form() {
    let rules = RestrictedRepos::from_document(&json!({
        "restrictedRepos": ["admin", ".github"]
    }));

    assert!(rules.is_restricted("admin"));
    assert!(!rules.is_restricted("widgets"));
}

/// Verify absent and null restrictedRepos yield an unrestricted rule.
#[test]
fn test_from_document_absent() {
    assert_eq!(
        RestrictedRepos::from_document(&json!({})),
        RestrictedRepos::default()
    );
    assert_eq!(
        RestrictedRepos::from_document(&json!({ "restrictedRepos": null })),
        RestrictedRepos::default()
    );
}

/// Verify an invalid pattern never matches rather than poisoning the rule.
#[test]
fn test_invalid_pattern_is_inert() {
    let rules = RestrictedRepos {
        include: vec![],
        exclude: vec!["([unclosed".to_string(), "foo".to_string()],
    };

    assert!(!rules.is_restricted("bar"));
    assert!(rules.is_restricted("foo"));
}

/// Verify validator patterns gate repository names.
#[test]
fn test_validator_pattern() {
    let validator = ValidatorConfig {
        pattern: "[a-zA-Z0-9_-]+_[a-zA-Z0-9_-]+.*".to_string(),
    };

    assert!(validator.is_valid("team_service").unwrap());
    assert!(!validator.is_valid("noseparator").unwrap());
}

/// Verify a malformed validator pattern surfaces as an error.
#[test]
fn test_validator_invalid_pattern_errors() {
    let validator = ValidatorConfig {
        pattern: "([unclosed".to_string(),
    };

    assert!(matches!(
        validator.is_valid("anything"),
        Err(ConfigurationError::InvalidPattern { .. })
    ));
}

/// Verify explicit literal inclusion is distinguishable from regex matches.
#[test]
fn test_explicitly_includes() {
    let rules = RestrictedRepos {
        include: vec![".github".to_string(), ".*-test$".to_string()],
        exclude: vec![],
    };

    assert!(rules.explicitly_includes(".github"));
    assert!(!rules.explicitly_includes("my-repo-test"));
}
