//! Tests for GitHub client error types.

use super::*;

/// Verify error display messages are stable; they end up in change records
/// and issue bodies.
#[test]
fn test_error_display_messages() {
    assert_eq!(Error::ApiError().to_string(), "API request failed");
    assert_eq!(Error::NotFound.to_string(), "Resource not found");
    assert_eq!(
        Error::RateLimitExceeded.to_string(),
        "Rate limit exceeded"
    );
    assert_eq!(Error::InvalidResponse.to_string(), "Invalid response format");
}

/// Verify auth errors carry the underlying detail.
#[test]
fn test_auth_error_includes_detail() {
    let err = Error::AuthError("bad PEM".to_string());
    assert!(err.to_string().contains("bad PEM"));
}

/// Verify serde_json errors convert into the Deserialization variant.
#[test]
fn test_deserialization_from_serde_json() {
    let parse_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    let err: Error = parse_err.into();
    assert!(matches!(err, Error::Deserialization(_)));
}
