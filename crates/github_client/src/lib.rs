//! Crate for interacting with the GitHub REST API.
//!
//! This crate provides a client for making authenticated requests to GitHub,
//! authenticating as a GitHub App using its ID and private key. The
//! reconciliation engine consumes the [`RepositoryAdmin`] trait rather than the
//! concrete client, so tests can substitute an in-memory implementation.
//!
//! Reads use typed helpers; every mutation flows through the generic
//! [`RepositoryAdmin::request`] primitive driven by an [`ApiCall`] description,
//! which is also what dry-run change records carry. The two execution modes
//! therefore describe and dispatch exactly the same calls.

use async_trait::async_trait;
use http_body_util::BodyExt;
use jsonwebtoken::EncodingKey;
use octocrab::Octocrab;
use secrecy::ExposeSecret;
use serde_json::Value;
use tracing::{debug, error, info, instrument};

pub mod errors;
pub use errors::Error;

pub mod models;
pub use models::{Account, EntryType, Installation, RepoKey, RulesetScope, TreeEntry};

pub mod request;
pub use request::{ApiCall, ApiMethod};

// Reference the tests module in the separate file
#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

/// Abstract interface for the repository-administration operations the
/// reconciliation engine needs.
///
/// The read side is typed per endpoint; the write side is the single generic
/// [`request`](Self::request) primitive, because mutations are described as
/// [`ApiCall`]s before being either recorded (dry-run) or dispatched (live).
///
/// All operations are idempotent from the engine's perspective; retries are the
/// transport's responsibility.
#[async_trait]
pub trait RepositoryAdmin: Send + Sync {
    /// Dispatches a described API call and returns the parsed response body,
    /// or `Value::Null` for empty (204) responses.
    async fn request(&self, call: &ApiCall) -> Result<Value, Error>;

    /// Paginated GET returning the concatenation of all pages of a JSON array
    /// endpoint. `path` may already carry a query string.
    async fn list(&self, path: &str) -> Result<Vec<Value>, Error>;

    /// Fetches the raw repository object.
    async fn get_repository(&self, repo: &RepoKey) -> Result<Value, Error>;

    /// Fetches branch protection for one branch. `Error::NotFound` means the
    /// branch currently has no protection.
    async fn get_branch_protection(&self, repo: &RepoKey, branch: &str) -> Result<Value, Error>;

    /// Lists rulesets at the given scope with full rule details.
    ///
    /// GitHub's list endpoint omits the `rules` array, so each ruleset whose
    /// `source_type` matches the scope is re-fetched by id.
    async fn list_rulesets(&self, repo: &RepoKey, scope: RulesetScope)
        -> Result<Vec<Value>, Error>;

    /// Lists the teams with access to a repository.
    async fn list_repository_teams(&self, repo: &RepoKey) -> Result<Vec<Value>, Error>;

    /// Lists the organization's security-manager teams.
    async fn list_security_manager_teams(&self, org: &str) -> Result<Vec<Value>, Error>;

    /// Fetches one team by slug. `Error::NotFound` means the team does not exist.
    async fn get_team(&self, org: &str, slug: &str) -> Result<Value, Error>;

    /// Lists direct collaborators on a repository.
    async fn list_collaborators(&self, repo: &RepoKey) -> Result<Vec<Value>, Error>;

    /// Lists deployment environments for a repository.
    async fn list_environments(&self, repo: &RepoKey) -> Result<Vec<Value>, Error>;

    /// Lists all repositories of an organization.
    async fn list_org_repositories(&self, org: &str) -> Result<Vec<Value>, Error>;

    /// Lists the repositories a team has access to.
    async fn list_team_repositories(&self, org: &str, team_slug: &str)
        -> Result<Vec<Value>, Error>;

    /// Fetches the custom property values assigned to a repository.
    async fn get_custom_property_values(&self, repo: &RepoKey) -> Result<Vec<Value>, Error>;

    /// Fetches a file's decoded contents at an optional ref.
    async fn get_file_contents(
        &self,
        repo: &RepoKey,
        path: &str,
        git_ref: Option<&str>,
    ) -> Result<String, Error>;

    /// Lists a directory of a repository at an optional ref.
    async fn list_directory(
        &self,
        repo: &RepoKey,
        path: &str,
        git_ref: Option<&str>,
    ) -> Result<Vec<TreeEntry>, Error>;
}

/// A client for interacting with the GitHub API, authenticated as a GitHub App.
#[derive(Debug)]
pub struct GitHubClient {
    client: Octocrab,
}

impl GitHubClient {
    /// Creates a new `GitHubClient` wrapping an authenticated `Octocrab` instance.
    pub fn new(client: Octocrab) -> Self {
        Self { client }
    }

    /// Gets an installation access token for a specific organization.
    ///
    /// This method finds the installation for the given organization and returns
    /// an access token that can be used for API calls scoped to that installation.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidResponse` if no installation is found for the
    /// organization or the token cannot be retrieved.
    #[instrument(skip(self), fields(org_name = %org_name))]
    pub async fn get_installation_token_for_org(&self, org_name: &str) -> Result<String, Error> {
        let installations = self.list_installations().await?;

        let installation = installations
            .into_iter()
            .find(|inst| inst.account.login.eq_ignore_ascii_case(org_name))
            .ok_or_else(|| {
                error!(
                    org_name = org_name,
                    "No installation found for organization - the GitHub App is not installed there"
                );
                Error::InvalidResponse
            })?;

        debug!(
            org_name = org_name,
            installation_id = installation.id,
            "Found matching installation for organization"
        );

        let (_, token) = self
            .client
            .installation_and_token(installation.id.into())
            .await
            .map_err(|e| {
                log_octocrab_error("Failed to get installation token", e);
                Error::InvalidResponse
            })?;

        Ok(token.expose_secret().to_string())
    }

    /// Lists all installations for the authenticated GitHub App.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidResponse` if the API call fails or the response
    /// cannot be parsed.
    #[instrument(skip(self))]
    pub async fn list_installations(&self) -> Result<Vec<models::Installation>, Error> {
        let result: octocrab::Result<Vec<octocrab::models::Installation>> =
            self.client.get("/app/installations", None::<&()>).await;

        match result {
            Ok(installations) => {
                let converted: Vec<models::Installation> = installations
                    .into_iter()
                    .map(models::Installation::from)
                    .collect();

                info!(
                    count = converted.len(),
                    "Retrieved installations for GitHub App"
                );

                Ok(converted)
            }
            Err(e) => {
                error!("Failed to list installations - JWT authentication likely failed");
                log_octocrab_error("Failed to list installations", e);
                Err(Error::InvalidResponse)
            }
        }
    }

    /// Typed GET helper shared by the trait implementation.
    async fn get_json(&self, path: &str) -> Result<Value, Error> {
        let result: octocrab::Result<Value> = self.client.get(path, None::<&()>).await;
        result.map_err(|e| map_octocrab_error("GET request failed", path, e))
    }
}

#[async_trait]
impl RepositoryAdmin for GitHubClient {
    async fn request(&self, call: &ApiCall) -> Result<Value, Error> {
        let uri = http::Uri::try_from(call.path.as_str()).map_err(|e| {
            error!(path = %call.path, error = %e, "API call path is not a valid URI");
            Error::InvalidResponse
        })?;

        debug!(call = %call, "Dispatching API call");
        let result = match call.method {
            ApiMethod::Get => self.client._get(uri).await,
            ApiMethod::Post => self.client._post(uri, call.body.as_ref()).await,
            ApiMethod::Put => self.client._put(uri, call.body.as_ref()).await,
            ApiMethod::Patch => self.client._patch(uri, call.body.as_ref()).await,
            ApiMethod::Delete => self.client._delete(uri, call.body.as_ref()).await,
        };

        let response = result.map_err(|e| map_octocrab_error("API call failed", &call.path, e))?;
        let response = octocrab::map_github_error(response)
            .await
            .map_err(|e| map_octocrab_error("API call was rejected", &call.path, e))?;

        let bytes = response
            .into_body()
            .collect()
            .await
            .map_err(|e| {
                error!(path = %call.path, error = %e, "Failed to read response body");
                Error::InvalidResponse
            })?
            .to_bytes();

        if bytes.is_empty() {
            Ok(Value::Null)
        } else {
            Ok(serde_json::from_slice(&bytes)?)
        }
    }

    async fn list(&self, path: &str) -> Result<Vec<Value>, Error> {
        let mut results = Vec::new();
        let mut page = 1u32;
        loop {
            let separator = if path.contains('?') { '&' } else { '?' };
            let paged = format!("{path}{separator}per_page=100&page={page}");
            let batch: Vec<Value> = self
                .client
                .get(&paged, None::<&()>)
                .await
                .map_err(|e| map_octocrab_error("Paginated list failed", path, e))?;

            let count = batch.len();
            results.extend(batch);
            if count < 100 {
                break;
            }
            page += 1;
        }
        Ok(results)
    }

    async fn get_repository(&self, repo: &RepoKey) -> Result<Value, Error> {
        self.get_json(&format!("/repos/{}/{}", repo.owner, repo.name))
            .await
    }

    async fn get_branch_protection(&self, repo: &RepoKey, branch: &str) -> Result<Value, Error> {
        self.get_json(&format!(
            "/repos/{}/{}/branches/{}/protection",
            repo.owner, repo.name, branch
        ))
        .await
    }

    async fn list_rulesets(
        &self,
        repo: &RepoKey,
        scope: RulesetScope,
    ) -> Result<Vec<Value>, Error> {
        let base = scope.base_path(repo);
        let summaries = self.list(&base).await?;

        // The list endpoint omits `rules`; fetch each same-scope ruleset by id.
        let mut detailed = Vec::new();
        for summary in summaries {
            if summary["source_type"] != scope.source_type() {
                continue;
            }
            let Some(id) = summary["id"].as_u64() else {
                continue;
            };
            detailed.push(self.get_json(&format!("{base}/{id}")).await?);
        }
        Ok(detailed)
    }

    async fn list_repository_teams(&self, repo: &RepoKey) -> Result<Vec<Value>, Error> {
        self.list(&format!("/repos/{}/{}/teams", repo.owner, repo.name))
            .await
    }

    async fn list_security_manager_teams(&self, org: &str) -> Result<Vec<Value>, Error> {
        self.list(&format!("/orgs/{org}/security-managers")).await
    }

    async fn get_team(&self, org: &str, slug: &str) -> Result<Value, Error> {
        self.get_json(&format!("/orgs/{org}/teams/{slug}")).await
    }

    async fn list_collaborators(&self, repo: &RepoKey) -> Result<Vec<Value>, Error> {
        self.list(&format!(
            "/repos/{}/{}/collaborators?affiliation=direct",
            repo.owner, repo.name
        ))
        .await
    }

    async fn list_environments(&self, repo: &RepoKey) -> Result<Vec<Value>, Error> {
        let response = self
            .get_json(&format!(
                "/repos/{}/{}/environments?per_page=100",
                repo.owner, repo.name
            ))
            .await?;

        match response.get("environments").and_then(Value::as_array) {
            Some(environments) => Ok(environments.clone()),
            None => Err(Error::InvalidResponse),
        }
    }

    async fn list_org_repositories(&self, org: &str) -> Result<Vec<Value>, Error> {
        self.list(&format!("/orgs/{org}/repos?type=all")).await
    }

    async fn list_team_repositories(
        &self,
        org: &str,
        team_slug: &str,
    ) -> Result<Vec<Value>, Error> {
        self.list(&format!("/orgs/{org}/teams/{team_slug}/repos"))
            .await
    }

    async fn get_custom_property_values(&self, repo: &RepoKey) -> Result<Vec<Value>, Error> {
        let response = self
            .get_json(&format!(
                "/repos/{}/{}/properties/values",
                repo.owner, repo.name
            ))
            .await?;

        match response.as_array() {
            Some(values) => Ok(values.clone()),
            None => Err(Error::InvalidResponse),
        }
    }

    async fn get_file_contents(
        &self,
        repo: &RepoKey,
        path: &str,
        git_ref: Option<&str>,
    ) -> Result<String, Error> {
        let mut url = format!("/repos/{}/{}/contents/{}", repo.owner, repo.name, path);
        if let Some(git_ref) = git_ref {
            url.push_str(&format!("?ref={git_ref}"));
        }

        let response = self.get_json(&url).await?;
        decode_contents(&response)
    }

    async fn list_directory(
        &self,
        repo: &RepoKey,
        path: &str,
        git_ref: Option<&str>,
    ) -> Result<Vec<TreeEntry>, Error> {
        let mut url = format!("/repos/{}/{}/contents/{}", repo.owner, repo.name, path);
        if let Some(git_ref) = git_ref {
            url.push_str(&format!("?ref={git_ref}"));
        }

        let response = self.get_json(&url).await?;
        Ok(serde_json::from_value(response)?)
    }
}

/// Decodes the base64 `content` field of a Contents API response.
fn decode_contents(response: &Value) -> Result<String, Error> {
    use base64::Engine as _;

    let encoded = response
        .get("content")
        .and_then(Value::as_str)
        .ok_or(Error::InvalidResponse)?;

    // GitHub wraps base64 content at 60 columns.
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| {
            error!(error = %e, "Contents response carried invalid base64");
            Error::InvalidResponse
        })?;

    String::from_utf8(bytes).map_err(|e| {
        error!(error = %e, "Decoded file contents were not valid UTF-8");
        Error::InvalidResponse
    })
}

/// Authenticates with GitHub using an installation access token for a specific
/// app installation.
///
/// Retrieves an access token for a GitHub App installation and returns a new
/// `Octocrab` client authenticated with that token.
///
/// # Errors
///
/// Returns `Error::InvalidResponse` if the installation cannot be found or the
/// access token cannot be created.
#[instrument(skip(octocrab))]
pub async fn authenticate_with_access_token(
    octocrab: &Octocrab,
    installation_id: u64,
    org_name: &str,
) -> Result<Octocrab, Error> {
    debug!(org_name, installation_id, "Finding installation");

    let (api_with_token, _) = octocrab
        .installation_and_token(installation_id.into())
        .await
        .map_err(|e| {
            log_octocrab_error("Failed to create a token for the installation", e);
            Error::InvalidResponse
        })?;

    info!(org_name, installation_id, "Created access token for installation");

    Ok(api_with_token)
}

/// Creates an `Octocrab` client authenticated as a GitHub App using a JWT token.
///
/// # Arguments
///
/// * `app_id` - The ID of the GitHub App.
/// * `private_key` - The private key associated with the GitHub App, in PEM format.
///
/// # Errors
///
/// Returns `Error::AuthError` if the private key cannot be parsed or the client
/// cannot be built.
#[instrument(skip(private_key))]
pub async fn create_app_client(app_id: u64, private_key: &str) -> Result<Octocrab, Error> {
    let key = EncodingKey::from_rsa_pem(private_key.as_bytes()).map_err(|e| {
        error!(
            app_id = app_id,
            error = %e,
            "Failed to parse RSA private key - key format is invalid"
        );
        Error::AuthError(format!("Failed to translate the private key. Error was: {}", e))
    })?;

    let octocrab = Octocrab::builder()
        .app(app_id.into(), key)
        .build()
        .map_err(|e| {
            error!(
                app_id = app_id,
                error = ?e,
                "Failed to build Octocrab client with GitHub App credentials"
            );
            Error::AuthError("Failed to build a client for the GitHub App.".to_string())
        })?;

    info!(app_id = app_id, "Created GitHub App client");

    Ok(octocrab)
}

/// Creates an `Octocrab` client authenticated with a personal access token.
#[instrument(skip(token))]
pub fn create_token_client(token: &str) -> Result<Octocrab, Error> {
    Octocrab::builder()
        .personal_token(token.to_string())
        .build()
        .map_err(|_| Error::ApiError())
}

/// Maps an octocrab error to the crate error taxonomy, logging the detail.
///
/// 404s become `Error::NotFound` so callers can distinguish "absent" from
/// "failed"; rate-limit rejections become `Error::RateLimitExceeded`.
fn map_octocrab_error(message: &str, path: &str, e: octocrab::Error) -> Error {
    if let octocrab::Error::GitHub { ref source, .. } = e {
        if source.status_code == http::StatusCode::NOT_FOUND {
            debug!(path, "GitHub returned 404");
            return Error::NotFound;
        }
        if source.status_code == http::StatusCode::FORBIDDEN
            && source.message.contains("rate limit")
        {
            return Error::RateLimitExceeded;
        }
    }
    log_octocrab_error(message, e);
    Error::ApiError()
}

fn log_octocrab_error(message: &str, e: octocrab::Error) {
    match e {
        octocrab::Error::GitHub { source, backtrace } => {
            let err = source;
            error!(
                error_message = err.message,
                backtrace = backtrace.to_string(),
                "{}. Received an error from GitHub",
                message
            )
        }
        octocrab::Error::UriParse { source, backtrace } => error!(
            error_message = source.to_string(),
            backtrace = backtrace.to_string(),
            "{}. Failed to parse URI.",
            message
        ),
        octocrab::Error::Uri { source, backtrace } => error!(
            error_message = source.to_string(),
            backtrace = backtrace.to_string(),
            "{}, Failed to parse URI.",
            message
        ),
        octocrab::Error::InvalidHeaderValue { source, backtrace } => error!(
            error_message = source.to_string(),
            backtrace = backtrace.to_string(),
            "{}. One of the header values was invalid.",
            message
        ),
        octocrab::Error::InvalidUtf8 { source, backtrace } => error!(
            error_message = source.to_string(),
            backtrace = backtrace.to_string(),
            "{}. The message wasn't valid UTF-8.",
            message,
        ),
        _ => error!(error_message = e.to_string(), message),
    };
}
