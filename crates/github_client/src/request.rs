//! Remote call descriptions.
//!
//! An [`ApiCall`] is a self-contained description of one REST call: method, path,
//! and optional JSON body. The reconciliation engine builds these for every
//! prospective mutation; in dry-run mode they are embedded verbatim in change
//! records, in live mode they are dispatched through
//! [`RepositoryAdmin::request`](crate::RepositoryAdmin::request). Keeping the
//! description and the dispatch in one type is what guarantees the dry-run
//! preview and the real run issue the same calls.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;

/// HTTP method for an [`ApiCall`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ApiMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl ApiMethod {
    /// The method name as it appears on the wire and in dry-run output.
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiMethod::Get => "GET",
            ApiMethod::Post => "POST",
            ApiMethod::Put => "PUT",
            ApiMethod::Patch => "PATCH",
            ApiMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for ApiMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A description of one GitHub REST call.
///
/// `path` is relative to the API root (e.g. `/repos/acme/widgets/rulesets/42`).
///
/// # Examples
///
/// ```rust
/// use github_client::ApiCall;
/// use serde_json::json;
///
/// let call = ApiCall::put(
///     "/repos/acme/widgets/environments/production",
///     json!({ "wait_timer": 30 }),
/// );
/// assert_eq!(call.to_string(), "PUT /repos/acme/widgets/environments/production");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiCall {
    /// HTTP method to use.
    pub method: ApiMethod,

    /// Path relative to the API root, including any query string.
    pub path: String,

    /// JSON request body, if the call carries one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl ApiCall {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: ApiMethod::Get,
            path: path.into(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: ApiMethod::Post,
            path: path.into(),
            body: Some(body),
        }
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: ApiMethod::Put,
            path: path.into(),
            body: Some(body),
        }
    }

    /// A PUT without a body (e.g. adding a team to a repository where all
    /// parameters live in the path).
    pub fn put_empty(path: impl Into<String>) -> Self {
        Self {
            method: ApiMethod::Put,
            path: path.into(),
            body: None,
        }
    }

    pub fn patch(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: ApiMethod::Patch,
            path: path.into(),
            body: Some(body),
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            method: ApiMethod::Delete,
            path: path.into(),
            body: None,
        }
    }
}

impl fmt::Display for ApiCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}
