//! Repository scope restrictions and name validation.
//!
//! Two independent gates decide whether a repository is reconciled at all:
//! the `restrictedRepos` include/exclude rules, and the optional `validator`
//! pattern the repository name must satisfy. Both are preconditions — a
//! repository failing either is skipped cleanly, never treated as an error.

use crate::errors::{ConfigurationError, ConfigurationResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[cfg(test)]
#[path = "restrictions_tests.rs"]
mod tests;

/// The `restrictedRepos` rule from the merged configuration.
///
/// Patterns are tried as literal names first, then as regular expressions
/// searched against the repository name (unanchored, matching the original
/// behavior — anchor explicitly with `^`/`$` where needed).
///
/// - `include` set: only matching names are in scope.
/// - `exclude` set: matching names are out of scope.
/// - neither set: every name is in scope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RestrictedRepos {
    #[serde(default)]
    pub include: Vec<String>,

    #[serde(default)]
    pub exclude: Vec<String>,
}

impl RestrictedRepos {
    /// Reads the rule from a merged configuration document.
    ///
    /// Accepts the `{include, exclude}` object form, the deployment fallback's
    /// plain list form (treated as `exclude`), and absent/null (no
    /// restrictions).
    pub fn from_document(document: &Value) -> Self {
        match document.get("restrictedRepos") {
            Some(Value::Object(_)) => {
                serde_json::from_value(document["restrictedRepos"].clone()).unwrap_or_default()
            }
            Some(Value::Array(names)) => Self {
                include: Vec::new(),
                exclude: names
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect(),
            },
            _ => Self::default(),
        }
    }

    /// Whether the named repository is out of scope for reconciliation.
    pub fn is_restricted(&self, repo_name: &str) -> bool {
        if !self.include.is_empty() {
            return !Self::any_matches(&self.include, repo_name);
        }
        if !self.exclude.is_empty() {
            return Self::any_matches(&self.exclude, repo_name);
        }
        false
    }

    fn any_matches(patterns: &[String], repo_name: &str) -> bool {
        patterns.iter().any(|pattern| {
            pattern == repo_name
                || Regex::new(pattern)
                    .map(|re| re.is_match(repo_name))
                    .unwrap_or(false)
        })
    }

    /// Whether a name is listed literally in `include`, which lifts the
    /// default deny-list for the admin repository and friends.
    pub fn explicitly_includes(&self, repo_name: &str) -> bool {
        self.include.iter().any(|pattern| pattern == repo_name)
    }
}

/// The `validator` block: a pattern every repository name must satisfy before
/// any mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatorConfig {
    pub pattern: String,
}

impl ValidatorConfig {
    /// Reads the validator from a merged configuration document, if present.
    pub fn from_document(document: &Value) -> Option<Self> {
        document
            .get("validator")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Checks the repository name against the pattern.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::InvalidPattern` when the configured pattern
    /// is not a valid regular expression; a broken validator must surface, not
    /// silently pass everything.
    pub fn is_valid(&self, repo_name: &str) -> ConfigurationResult<bool> {
        let re = Regex::new(&self.pattern).map_err(|e| ConfigurationError::InvalidPattern {
            pattern: self.pattern.clone(),
            reason: e.to_string(),
        })?;
        Ok(re.is_match(repo_name))
    }
}
