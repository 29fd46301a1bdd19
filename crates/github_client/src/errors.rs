//! Error types for GitHub client operations.
//!
//! This module defines the error types that can occur when interacting with the GitHub API
//! through the github_client crate. The reconciliation engine leans on the distinction
//! between `NotFound` (recoverable, usually "nothing to do") and every other variant
//! (transport failure for the resource kind being synced).

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;

/// Errors that can occur during GitHub client operations.
///
/// ## Examples
///
/// ```rust,ignore
/// use github_client::Error;
///
/// match client.get_repository(&repo).await {
///     Ok(live) => println!("archived: {}", live["archived"]),
///     Err(Error::NotFound) => println!("repository vanished"),
///     Err(err) => eprintln!("transport error: {}", err),
/// }
/// ```
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A generic API request failure.
    ///
    /// This error occurs when a GitHub API request fails for a reason the client
    /// does not model more precisely. The failing call has already been logged
    /// with the response details.
    #[error("API request failed")]
    ApiError(),

    /// Authentication or GitHub client initialization failure.
    ///
    /// This error occurs when:
    /// - GitHub App credentials are invalid or expired
    /// - Network connectivity issues prevent authentication
    /// - The GitHub App lacks necessary permissions
    ///
    /// The contained string provides specific details about the authentication failure.
    #[error("Failed to authenticate or initialize GitHub client: {0}")]
    AuthError(String),

    /// Error deserializing the response from GitHub.
    ///
    /// The GitHub API returned a response that cannot be parsed into the expected
    /// data structure. This may indicate API version changes or a truncated body.
    #[error("Failed to deserialize GitHub response: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// The GitHub API returned a response in an unexpected format.
    ///
    /// The response parsed, but its structure doesn't match what the client
    /// expects (e.g. a contents response without a `content` field).
    #[error("Invalid response format")]
    InvalidResponse,

    /// The requested resource was not found.
    ///
    /// A GitHub API request returned a 404 status code. For delete-style
    /// reconciliation operations this is treated as "already gone"; for reads it
    /// means the resource (or the whole repository) does not exist.
    #[error("Resource not found")]
    NotFound,

    /// GitHub API rate limit has been exceeded.
    ///
    /// The caller should back off and retry later; retry policy is the
    /// transport consumer's responsibility, not this crate's.
    #[error("Rate limit exceeded")]
    RateLimitExceeded,
}
