//! Tests for sub-organization fragments and membership matching.

use super::*;
use async_trait::async_trait;
use github_client::{ApiCall, Error, TreeEntry};
use serde_json::json;
use std::collections::HashMap;

/// Minimal in-memory RepositoryAdmin for membership evaluation.
#[derive(Default)]
struct FakeAdmin {
    /// team slug -> repositories (as raw repo objects)
    team_repos: HashMap<String, Vec<Value>>,
    /// repo name -> custom property values
    properties: HashMap<String, Vec<Value>>,
}

#[async_trait]
impl RepositoryAdmin for FakeAdmin {
    async fn request(&self, _call: &ApiCall) -> Result<Value, Error> {
        Err(Error::NotFound)
    }
    async fn list(&self, _path: &str) -> Result<Vec<Value>, Error> {
        Err(Error::NotFound)
    }
    async fn get_repository(&self, _repo: &RepoKey) -> Result<Value, Error> {
        Err(Error::NotFound)
    }
    async fn get_branch_protection(&self, _repo: &RepoKey, _branch: &str) -> Result<Value, Error> {
        Err(Error::NotFound)
    }
    async fn list_rulesets(
        &self,
        _repo: &RepoKey,
        _scope: github_client::RulesetScope,
    ) -> Result<Vec<Value>, Error> {
        Err(Error::NotFound)
    }
    async fn list_repository_teams(&self, _repo: &RepoKey) -> Result<Vec<Value>, Error> {
        Err(Error::NotFound)
    }
    async fn list_security_manager_teams(&self, _org: &str) -> Result<Vec<Value>, Error> {
        Err(Error::NotFound)
    }
    async fn get_team(&self, _org: &str, _slug: &str) -> Result<Value, Error> {
        Err(Error::NotFound)
    }
    async fn list_collaborators(&self, _repo: &RepoKey) -> Result<Vec<Value>, Error> {
        Err(Error::NotFound)
    }
    async fn list_environments(&self, _repo: &RepoKey) -> Result<Vec<Value>, Error> {
        Err(Error::NotFound)
    }
    async fn list_org_repositories(&self, _org: &str) -> Result<Vec<Value>, Error> {
        Err(Error::NotFound)
    }
    async fn list_team_repositories(
        &self,
        _org: &str,
        team_slug: &str,
    ) -> Result<Vec<Value>, Error> {
        match self.team_repos.get(team_slug) {
            Some(repos) => Ok(repos.clone()),
            None => Err(Error::NotFound),
        }
    }
    async fn get_custom_property_values(&self, repo: &RepoKey) -> Result<Vec<Value>, Error> {
        match self.properties.get(&repo.name) {
            Some(values) => Ok(values.clone()),
            None => Err(Error::NotFound),
        }
    }
    async fn get_file_contents(
        &self,
        _repo: &RepoKey,
        _path: &str,
        _git_ref: Option<&str>,
    ) -> Result<String, Error> {
        Err(Error::NotFound)
    }
    async fn list_directory(
        &self,
        _repo: &RepoKey,
        _path: &str,
        _git_ref: Option<&str>,
    ) -> Result<Vec<TreeEntry>, Error> {
        Err(Error::NotFound)
    }
}

fn fragment(name: &str, document: Value) -> SubOrgConfig {
    SubOrgConfig::new(name, format!(".github/suborgs/{name}.yml"), document)
}

fn matcher(admin: FakeAdmin) -> SubOrgMatcher {
    SubOrgMatcher::new(Arc::new(admin))
}

// ============================================================================
// Pattern matching
// ============================================================================

/// Verify literal names and glob wildcards in suborgrepos.
#[test]
fn test_matches_repo_name() {
    let fragment = fragment("frontend", json!({ "suborgrepos": ["new-repo", "web-*"] }));

    assert!(fragment.matches_repo_name("new-repo"));
    assert!(fragment.matches_repo_name("web-shop"));
    assert!(!fragment.matches_repo_name("new-repo-2"));
    assert!(!fragment.matches_repo_name("mobile-app"));
}

/// Verify suborgproperties flattens the list of single-key mappings.
#[test]
fn test_properties_flatten() {
    let fragment = fragment(
        "frontend",
        json!({ "suborgproperties": [{ "EDP": true }, { "do_no_delete": true }] }),
    );

    let properties = fragment.properties();
    assert_eq!(properties.len(), 2);
    assert_eq!(properties[0].0, "EDP");
}

// ============================================================================
// Membership evaluation
// ============================================================================

/// Verify a repository matching exactly one fragment resolves to it.
#[tokio::test]
async fn test_single_match_by_name() {
    let fragments = vec![
        fragment("frontend", json!({ "suborgrepos": ["new-repo"] })),
        fragment("backend", json!({ "suborgrepos": ["api-repo"] })),
    ];

    let matched = matcher(FakeAdmin::default())
        .matching_suborg(&RepoKey::new("acme", "new-repo"), &fragments)
        .await
        .unwrap();

    assert_eq!(matched.unwrap().name, "frontend");
}

/// Verify zero matches yields no suborg layer.
#[tokio::test]
async fn test_no_match() {
    let fragments = vec![fragment("frontend", json!({ "suborgrepos": ["other"] }))];

    let matched = matcher(FakeAdmin::default())
        .matching_suborg(&RepoKey::new("acme", "new-repo"), &fragments)
        .await
        .unwrap();

    assert!(matched.is_none());
}

/// Verify two matching fragments is a fatal conflict naming both paths and
/// the repository.
#[tokio::test]
async fn test_conflicting_fragments_error() {
    let fragments = vec![
        fragment("frontend", json!({ "suborgrepos": ["new-repo"] })),
        fragment("backend", json!({ "suborgrepos": ["new-repo"] })),
    ];

    let err = matcher(FakeAdmin::default())
        .matching_suborg(&RepoKey::new("acme", "new-repo"), &fragments)
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "Multiple suborg configs for new-repo in .github/suborgs/backend.yml and .github/suborgs/frontend.yml"
    );
}

/// Verify team-based membership consults the team's repository list.
#[tokio::test]
async fn test_team_membership() {
    let mut admin = FakeAdmin::default();
    admin.team_repos.insert(
        "core".to_string(),
        vec![json!({ "name": "platform-svc" })],
    );
    let fragments = vec![fragment("platform", json!({ "suborgteams": ["core"] }))];

    let matched = matcher(admin)
        .matching_suborg(&RepoKey::new("acme", "platform-svc"), &fragments)
        .await
        .unwrap();

    assert_eq!(matched.unwrap().name, "platform");
}

/// Verify property-based membership compares values textually, so a YAML
/// boolean matches GitHub's string form.
#[tokio::test]
async fn test_property_membership() {
    let mut admin = FakeAdmin::default();
    admin.properties.insert(
        "audited-repo".to_string(),
        vec![json!({ "property_name": "EDP", "value": "true" })],
    );
    let fragments = vec![fragment(
        "audited",
        json!({ "suborgproperties": [{ "EDP": true }] }),
    )];

    let matched = matcher(admin)
        .matching_suborg(&RepoKey::new("acme", "audited-repo"), &fragments)
        .await
        .unwrap();

    assert_eq!(matched.unwrap().name, "audited");
}

/// Verify a missing team (404) is treated as an empty membership rule, not an
/// error.
#[tokio::test]
async fn test_missing_team_is_not_fatal() {
    let fragments = vec![fragment("platform", json!({ "suborgteams": ["ghost"] }))];

    let matched = matcher(FakeAdmin::default())
        .matching_suborg(&RepoKey::new("acme", "anything"), &fragments)
        .await
        .unwrap();

    assert!(matched.is_none());
}
