//! Sub-organization fragments and membership matching.
//!
//! A sub-organization is a named subset of repositories sharing an additional
//! configuration fragment layered atop the org-wide settings. Fragments live
//! under `{config_path}/suborgs/*.yml` in the admin repository and declare
//! their membership through any combination of:
//!
//! - `suborgrepos` — repository names, `*` wildcards allowed
//! - `suborgteams` — team slugs; members are the teams' repositories
//! - `suborgproperties` — custom-property name/value pairs
//!
//! A repository must match at most one fragment. Two or more matches is a
//! fatal configuration error naming both fragment paths, because the layering
//! rule has no defined order between sibling fragments.

use crate::errors::{ConfigurationError, ConfigurationResult};
use github_client::{RepoKey, RepositoryAdmin};
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument};

#[cfg(test)]
#[path = "suborg_tests.rs"]
mod tests;

/// One sub-organization fragment: its name, the path it was loaded from, and
/// the parsed document (membership keys plus configuration keys).
#[derive(Debug, Clone, PartialEq)]
pub struct SubOrgConfig {
    pub name: String,
    pub path: String,
    pub document: Value,
}

impl SubOrgConfig {
    pub fn new(name: impl Into<String>, path: impl Into<String>, document: Value) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            document,
        }
    }

    /// The `suborgrepos` membership patterns.
    pub fn repo_patterns(&self) -> Vec<&str> {
        string_list(&self.document, "suborgrepos")
    }

    /// The `suborgteams` membership team slugs.
    pub fn teams(&self) -> Vec<&str> {
        string_list(&self.document, "suborgteams")
    }

    /// The `suborgproperties` membership pairs, flattened from the document's
    /// list of single-key mappings.
    pub fn properties(&self) -> Vec<(String, Value)> {
        let Some(entries) = self.document.get("suborgproperties").and_then(Value::as_array)
        else {
            return Vec::new();
        };
        entries
            .iter()
            .filter_map(Value::as_object)
            .flat_map(|map| map.iter().map(|(k, v)| (k.clone(), v.clone())))
            .collect()
    }

    /// Whether a repository name matches one of the `suborgrepos` patterns.
    ///
    /// A pattern is a literal name unless it contains `*`, in which case it is
    /// treated as a glob anchored over the whole name.
    pub fn matches_repo_name(&self, repo_name: &str) -> bool {
        self.repo_patterns().iter().any(|pattern| {
            if !pattern.contains('*') {
                return *pattern == repo_name;
            }
            glob_to_regex(pattern)
                .map(|re| re.is_match(repo_name))
                .unwrap_or(false)
        })
    }
}

fn string_list<'a>(document: &'a Value, key: &str) -> Vec<&'a str> {
    document
        .get(key)
        .and_then(Value::as_array)
        .map(|entries| entries.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}

fn glob_to_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let escaped = regex::escape(pattern).replace("\\*", ".*");
    Regex::new(&format!("^{escaped}$"))
}

/// Evaluates fragment membership rules against a repository, consulting the
/// API for team- and property-based rules.
pub struct SubOrgMatcher {
    admin: Arc<dyn RepositoryAdmin>,
}

impl SubOrgMatcher {
    pub fn new(admin: Arc<dyn RepositoryAdmin>) -> Self {
        Self { admin }
    }

    /// Finds the fragment the repository belongs to.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::SubOrgConflict` when the repository matches
    /// two or more fragments, naming the repository and both fragment paths.
    #[instrument(skip(self, fragments), fields(repository = %repo))]
    pub async fn matching_suborg(
        &self,
        repo: &RepoKey,
        fragments: &[SubOrgConfig],
    ) -> ConfigurationResult<Option<SubOrgConfig>> {
        let mut matches: Vec<&SubOrgConfig> = Vec::new();

        // Custom property values are per-repository; fetch them once, lazily.
        let mut properties: Option<Vec<Value>> = None;

        for fragment in fragments {
            if self
                .is_member(repo, fragment, &mut properties)
                .await?
            {
                debug!(suborg = %fragment.name, "Repository matches suborg fragment");
                matches.push(fragment);
            }
        }

        match matches.as_slice() {
            [] => Ok(None),
            [only] => Ok(Some((*only).clone())),
            [first, second, ..] => Err(ConfigurationError::SubOrgConflict {
                repository: repo.name.clone(),
                first_path: first.path.clone(),
                second_path: second.path.clone(),
            }),
        }
    }

    /// Whether a repository satisfies one fragment's membership rules,
    /// without conflict checking.
    pub async fn is_member_of(
        &self,
        repo: &RepoKey,
        fragment: &SubOrgConfig,
    ) -> ConfigurationResult<bool> {
        let mut properties = None;
        self.is_member(repo, fragment, &mut properties).await
    }

    async fn is_member(
        &self,
        repo: &RepoKey,
        fragment: &SubOrgConfig,
        properties: &mut Option<Vec<Value>>,
    ) -> ConfigurationResult<bool> {
        if fragment.matches_repo_name(&repo.name) {
            return Ok(true);
        }

        for team in fragment.teams() {
            let team_repos = match self.admin.list_team_repositories(&repo.owner, team).await {
                Ok(team_repos) => team_repos,
                Err(github_client::Error::NotFound) => continue,
                Err(e) => {
                    return Err(ConfigurationError::SourceError {
                        path: fragment.path.clone(),
                        reason: format!("failed to list repositories for team '{team}': {e}"),
                    })
                }
            };
            if team_repos
                .iter()
                .any(|r| r["name"].as_str() == Some(repo.name.as_str()))
            {
                return Ok(true);
            }
        }

        let declared = fragment.properties();
        if !declared.is_empty() {
            if properties.is_none() {
                *properties = Some(match self.admin.get_custom_property_values(repo).await {
                    Ok(values) => values,
                    Err(github_client::Error::NotFound) => Vec::new(),
                    Err(e) => {
                        return Err(ConfigurationError::SourceError {
                            path: fragment.path.clone(),
                            reason: format!("failed to fetch custom properties: {e}"),
                        })
                    }
                });
            }
            let live = properties.as_deref().unwrap_or(&[]);
            for (name, value) in &declared {
                let matched = live.iter().any(|entry| {
                    entry["property_name"].as_str() == Some(name.as_str())
                        && property_value_matches(&entry["value"], value)
                });
                if matched {
                    return Ok(true);
                }
            }
        }

        Ok(false)
    }
}

/// Compares a live custom-property value with a declared one.
///
/// GitHub reports values as strings (or string arrays); fragment authors write
/// native YAML scalars. Compare textually so `true` matches `"true"`.
fn property_value_matches(live: &Value, declared: &Value) -> bool {
    fn as_text(value: &Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s.clone()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    match (live, declared) {
        (Value::Array(values), declared) => values
            .iter()
            .any(|entry| property_value_matches(entry, declared)),
        (live, declared) => match (as_text(live), as_text(declared)) {
            (Some(a), Some(b)) => a == b,
            _ => live == declared,
        },
    }
}
