//! In-memory `RepositoryAdmin` used across the engine's unit tests.

use async_trait::async_trait;
use github_client::{ApiCall, ApiMethod, Error, RepoKey, RulesetScope, TreeEntry};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

/// Configurable fake remote. Reads come from the fields below; every call to
/// [`RepositoryAdmin::request`] is recorded so tests can assert on dispatched
/// mutations.
#[derive(Default)]
pub struct MockAdmin {
    /// Every ApiCall dispatched through `request`, in order.
    pub calls: Mutex<Vec<ApiCall>>,

    /// Response for `get_repository`; `None` means 404.
    pub repository: Mutex<Option<Value>>,

    /// Branch name -> protection document; absent means 404.
    pub branch_protection: Mutex<HashMap<String, Value>>,

    /// Detailed rulesets returned by `list_rulesets`.
    pub rulesets: Mutex<Vec<Value>>,

    /// Teams returned by `list_repository_teams`.
    pub repo_teams: Mutex<Vec<Value>>,

    /// Teams returned by `list_security_manager_teams`.
    pub security_teams: Mutex<Vec<Value>>,

    /// Team slug -> team object for `get_team`; absent means 404.
    pub teams: Mutex<HashMap<String, Value>>,

    /// Collaborators returned by `list_collaborators`.
    pub collaborators: Mutex<Vec<Value>>,

    /// Environments returned by `list_environments`.
    pub environments: Mutex<Vec<Value>>,

    /// Repositories returned by `list_org_repositories`.
    pub org_repos: Mutex<Vec<Value>>,

    /// Path -> response for GET calls through `request`; absent means 404.
    pub get_responses: Mutex<HashMap<String, Value>>,
}

impl MockAdmin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_repository(self, repository: Value) -> Self {
        *self.repository.lock().unwrap() = Some(repository);
        self
    }

    pub fn with_branch_protection(self, branch: &str, protection: Value) -> Self {
        self.branch_protection
            .lock()
            .unwrap()
            .insert(branch.to_string(), protection);
        self
    }

    pub fn with_get_response(self, path: &str, response: Value) -> Self {
        self.get_responses
            .lock()
            .unwrap()
            .insert(path.to_string(), response);
        self
    }

    /// The dispatched calls, cloned for assertions.
    pub fn dispatched(&self) -> Vec<ApiCall> {
        self.calls.lock().unwrap().clone()
    }

    /// The dispatched calls excluding GETs (the mutations).
    pub fn mutations(&self) -> Vec<ApiCall> {
        self.dispatched()
            .into_iter()
            .filter(|call| call.method != ApiMethod::Get)
            .collect()
    }
}

#[async_trait]
impl github_client::RepositoryAdmin for MockAdmin {
    async fn request(&self, call: &ApiCall) -> Result<Value, Error> {
        self.calls.lock().unwrap().push(call.clone());
        if call.method == ApiMethod::Get {
            return match self.get_responses.lock().unwrap().get(&call.path) {
                Some(response) => Ok(response.clone()),
                None => Err(Error::NotFound),
            };
        }
        Ok(Value::Null)
    }

    async fn list(&self, path: &str) -> Result<Vec<Value>, Error> {
        match self.get_responses.lock().unwrap().get(path) {
            Some(Value::Array(entries)) => Ok(entries.clone()),
            _ => Err(Error::NotFound),
        }
    }

    async fn get_repository(&self, _repo: &RepoKey) -> Result<Value, Error> {
        self.repository.lock().unwrap().clone().ok_or(Error::NotFound)
    }

    async fn get_branch_protection(&self, _repo: &RepoKey, branch: &str) -> Result<Value, Error> {
        self.branch_protection
            .lock()
            .unwrap()
            .get(branch)
            .cloned()
            .ok_or(Error::NotFound)
    }

    async fn list_rulesets(
        &self,
        _repo: &RepoKey,
        _scope: RulesetScope,
    ) -> Result<Vec<Value>, Error> {
        Ok(self.rulesets.lock().unwrap().clone())
    }

    async fn list_repository_teams(&self, _repo: &RepoKey) -> Result<Vec<Value>, Error> {
        Ok(self.repo_teams.lock().unwrap().clone())
    }

    async fn list_security_manager_teams(&self, _org: &str) -> Result<Vec<Value>, Error> {
        Ok(self.security_teams.lock().unwrap().clone())
    }

    async fn get_team(&self, _org: &str, slug: &str) -> Result<Value, Error> {
        self.teams
            .lock()
            .unwrap()
            .get(slug)
            .cloned()
            .ok_or(Error::NotFound)
    }

    async fn list_collaborators(&self, _repo: &RepoKey) -> Result<Vec<Value>, Error> {
        Ok(self.collaborators.lock().unwrap().clone())
    }

    async fn list_environments(&self, _repo: &RepoKey) -> Result<Vec<Value>, Error> {
        Ok(self.environments.lock().unwrap().clone())
    }

    async fn list_org_repositories(&self, _org: &str) -> Result<Vec<Value>, Error> {
        Ok(self.org_repos.lock().unwrap().clone())
    }

    async fn list_team_repositories(
        &self,
        _org: &str,
        _team_slug: &str,
    ) -> Result<Vec<Value>, Error> {
        Err(Error::NotFound)
    }

    async fn get_custom_property_values(&self, _repo: &RepoKey) -> Result<Vec<Value>, Error> {
        Err(Error::NotFound)
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
