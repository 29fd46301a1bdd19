//! The merged desired-state document for one repository.
//!
//! [`DesiredConfig`] is the output of configuration resolution: the fully
//! merged document split into the per-resource entry lists the reconciliation
//! plugins consume. It is built once per reconciliation request and never
//! mutated afterwards.

use crate::errors::{ConfigurationError, ConfigurationResult};
use crate::restrictions::{RestrictedRepos, ValidatorConfig};
use serde_json::Value;

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;

/// The fully merged configuration tree for one repository.
///
/// Resource entries stay as raw `serde_json::Value` attribute bags — their
/// identity within a collection is defined by the owning plugin's comparator,
/// not by this type.
///
/// Entry lists are `None` when the document does not mention the resource
/// kind at all. The distinction matters: an absent `teams:` key leaves team
/// access alone, while an explicit empty list removes every managed team.
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredConfig {
    /// The repository-metadata block (`repository:`), if configured.
    pub repository: Option<Value>,

    /// Branch entries (`branches:`), each with a `name` and optional `protection`.
    pub branches: Option<Vec<Value>>,

    /// Ruleset entries (`rulesets:`).
    pub rulesets: Option<Vec<Value>>,

    /// Team entries (`teams:`), each with a `name` and `permission`.
    pub teams: Option<Vec<Value>>,

    /// Collaborator entries (`collaborators:`), each with a `username` and
    /// `permission`.
    pub collaborators: Option<Vec<Value>>,

    /// Environment entries (`environments:`).
    pub environments: Option<Vec<Value>>,

    /// Scope restriction rules.
    pub restricted_repos: RestrictedRepos,

    /// Optional repository-name validator.
    pub validator: Option<ValidatorConfig>,

    /// The complete merged document the lists above were read from.
    pub document: Value,
}

impl DesiredConfig {
    /// Splits a merged configuration document into resource entry lists.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::InvalidConfiguration` when a resource key
    /// is present but is neither a sequence nor null.
    pub fn from_document(document: Value) -> ConfigurationResult<Self> {
        let restricted_repos = RestrictedRepos::from_document(&document);
        let validator = ValidatorConfig::from_document(&document);

        let repository = match document.get("repository") {
            Some(Value::Null) | None => None,
            Some(value) => Some(value.clone()),
        };

        Ok(Self {
            branches: entry_list(&document, "branches")?,
            rulesets: entry_list(&document, "rulesets")?,
            teams: entry_list(&document, "teams")?,
            collaborators: entry_list(&document, "collaborators")?,
            environments: entry_list(&document, "environments")?,
            repository,
            restricted_repos,
            validator,
            document,
        })
    }

    /// Whether the document configures anything a resource plugin would act on.
    pub fn is_empty(&self) -> bool {
        self.repository.is_none()
            && self.branches.is_none()
            && self.rulesets.is_none()
            && self.teams.is_none()
            && self.collaborators.is_none()
            && self.environments.is_none()
    }
}

/// Reads one resource entry list from the merged document.
///
/// Absent and null keys mean "unmanaged" (`None`). Entries that are null (a
/// repo-level file blanking a single inherited entry) are dropped; a
/// non-sequence value for the key is a configuration error rather than
/// something to guess about.
fn entry_list(document: &Value, key: &str) -> ConfigurationResult<Option<Vec<Value>>> {
    match document.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(entries)) => Ok(Some(
            entries
                .iter()
                .filter(|entry| !entry.is_null())
                .cloned()
                .collect(),
        )),
        Some(other) => Err(ConfigurationError::InvalidConfiguration {
            field: key.to_string(),
            reason: format!("expected a sequence, found {}", value_kind(other)),
        }),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}
