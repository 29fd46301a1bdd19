//! # Models
//!
//! Data models shared between the GitHub client and the reconciliation engine.
//!
//! Resource state that gets diffed (branch protection, rulesets, teams,
//! environments, …) deliberately stays as raw `serde_json::Value` trees — the
//! desired-state documents are free-form attribute bags and the structural diff
//! operates on exactly what GitHub returned. The types here are the stable
//! identifiers and envelopes around those bags.

use serde::{Deserialize, Serialize};
use std::fmt;

#[cfg(test)]
#[path = "models_tests.rs"]
mod tests;

/// Identifies a target repository by owner and name.
///
/// Compared by value; used as the key for every per-repository reconciliation
/// run and carried on every change record.
///
/// # Examples
///
/// ```rust
/// use github_client::RepoKey;
///
/// let repo = RepoKey::new("acme", "widgets");
/// assert_eq!(repo.to_string(), "acme/widgets");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoKey {
    /// The owner of the repository (the organization name).
    pub owner: String,

    /// The name of the repository.
    pub name: String,
}

impl RepoKey {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for RepoKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Represents a GitHub account (user or organization).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Account {
    /// The unique ID of the account
    pub id: u64,
    /// The login name of the account
    pub login: String,
    /// The type of account (User or Organization)
    #[serde(rename = "type")]
    pub account_type: String,
}

/// Represents a GitHub App installation.
///
/// This struct contains information about where a GitHub App is installed,
/// such as an organization or user account.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Installation {
    /// The unique ID of the installation
    pub id: u64,
    /// The account (user or organization) where the app is installed
    pub account: Account,
    /// Optional repository selection details
    pub repository_selection: Option<String>,
}

impl From<octocrab::models::Installation> for Installation {
    fn from(value: octocrab::models::Installation) -> Self {
        Self {
            id: *value.id,
            account: Account {
                id: *value.account.id,
                login: value.account.login,
                account_type: value.account.r#type,
            },
            repository_selection: value.repository_selection,
        }
    }
}

/// Scope at which a ruleset lives.
///
/// Repository rulesets are managed under `/repos/{owner}/{repo}/rulesets`,
/// organization rulesets under `/orgs/{org}/rulesets`. The ruleset plugin is
/// parameterized by this scope; everything else about its behavior is shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RulesetScope {
    /// Ruleset attached to a single repository.
    Repo,
    /// Ruleset attached to the organization.
    Org,
}

impl RulesetScope {
    /// The `source_type` value GitHub reports for rulesets of this scope.
    pub fn source_type(&self) -> &'static str {
        match self {
            RulesetScope::Repo => "Repository",
            RulesetScope::Org => "Organization",
        }
    }

    /// Base path for ruleset operations at this scope.
    pub fn base_path(&self, repo: &RepoKey) -> String {
        match self {
            RulesetScope::Repo => format!("/repos/{}/{}/rulesets", repo.owner, repo.name),
            RulesetScope::Org => format!("/orgs/{}/rulesets", repo.owner),
        }
    }
}

/// A single entry in a GitHub repository directory listing.
///
/// Represents files, directories, symlinks, and submodules returned by
/// the GitHub Contents API. Used when enumerating the admin repository's
/// sub-organization fragment directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    /// Entry name (e.g., "frontend.yml")
    pub name: String,

    /// Full path within repository (e.g., ".github/suborgs/frontend.yml")
    pub path: String,

    /// Entry type (file, directory, symlink, submodule)
    #[serde(rename = "type")]
    pub entry_type: EntryType,

    /// Git SHA of the entry
    pub sha: String,
}

/// Type of entry in a repository directory.
///
/// Maps to GitHub's content type field in the Contents API response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    /// Regular file
    File,

    /// Directory (can contain other entries)
    Dir,

    /// Symbolic link
    Symlink,

    /// Git submodule reference
    Submodule,
}
