//! Unit tests for the github_client crate.

use super::*; // Import items from lib.rs
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Builds a client pointed at the mock server, authenticated with a dummy token.
fn test_client(server: &MockServer) -> GitHubClient {
    let octocrab = Octocrab::builder()
        .base_uri(server.uri())
        .unwrap()
        .personal_token("test-token".to_string())
        .build()
        .unwrap();
    GitHubClient::new(octocrab)
}

#[tokio::test]
async fn test_request_returns_null_for_empty_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/repos/acme/widgets/rulesets/42"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let call = ApiCall::delete("/repos/acme/widgets/rulesets/42");
    let result = client.request(&call).await;

    assert!(result.is_ok());
    assert_eq!(result.unwrap(), Value::Null);
}

#[tokio::test]
async fn test_request_parses_json_response_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/repos/acme/widgets"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "name": "widgets", "archived": true })),
        )
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let call = ApiCall::patch("/repos/acme/widgets", json!({ "archived": true }));
    let result = client.request(&call).await.unwrap();

    assert_eq!(result["archived"], true);
}

#[tokio::test]
async fn test_request_maps_404_to_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "message": "Not Found",
            "documentation_url": "https://docs.github.com/rest"
        })))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let result = client.get_repository(&RepoKey::new("acme", "gone")).await;

    assert!(matches!(result, Err(Error::NotFound)));
}

#[tokio::test]
async fn test_list_concatenates_pages() {
    let mock_server = MockServer::start().await;

    // First page is full (100 entries) so a second fetch happens.
    let first_page: Vec<Value> = (0..100).map(|i| json!({ "id": i })).collect();
    Mock::given(method("GET"))
        .and(path("/orgs/acme/repos"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&first_page))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/orgs/acme/repos"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": 100 }])))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let result = client.list("/orgs/acme/repos?type=all").await.unwrap();

    assert_eq!(result.len(), 101);
    assert_eq!(result[100]["id"], 100);
}

#[tokio::test]
async fn test_list_rulesets_fetches_details_for_matching_scope() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/rulesets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 1, "name": "base", "source_type": "Repository" },
            { "id": 2, "name": "org-wide", "source_type": "Organization" }
        ])))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/rulesets/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 1,
            "name": "base",
            "source_type": "Repository",
            "rules": [{ "type": "deletion" }]
        })))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let repo = RepoKey::new("acme", "widgets");
    let rulesets = client
        .list_rulesets(&repo, RulesetScope::Repo)
        .await
        .unwrap();

    // The organization-sourced ruleset is skipped; the repository one carries rules.
    assert_eq!(rulesets.len(), 1);
    assert_eq!(rulesets[0]["rules"][0]["type"], "deletion");
}

#[tokio::test]
async fn test_get_file_contents_decodes_base64() {
    let mock_server = MockServer::start().await;

    use base64::Engine as _;
    let encoded = base64::engine::general_purpose::STANDARD.encode("restrictedRepos:\n  exclude: [foo]\n");

    Mock::given(method("GET"))
        .and(path("/repos/acme/admin/contents/.github/settings.yml"))
        .and(query_param("ref", "main"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "settings.yml",
            "path": ".github/settings.yml",
            "encoding": "base64",
            "content": encoded
        })))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let repo = RepoKey::new("acme", "admin");
    let contents = client
        .get_file_contents(&repo, ".github/settings.yml", Some("main"))
        .await
        .unwrap();

    assert!(contents.starts_with("restrictedRepos:"));
}

#[tokio::test]
async fn test_list_environments_unwraps_envelope() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/environments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total_count": 1,
            "environments": [{ "name": "production" }]
        })))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let repo = RepoKey::new("acme", "widgets");
    let environments = client.list_environments(&repo).await.unwrap();

    assert_eq!(environments.len(), 1);
    assert_eq!(environments[0]["name"], "production");
}

/// Verify base64 content decoding handles GitHub's 60-column line wrapping.
#[test]
fn test_decode_contents_strips_whitespace() {
    use base64::Engine as _;
    let encoded = base64::engine::general_purpose::STANDARD.encode("hello world");
    let wrapped = format!("{}\n{}", &encoded[..8], &encoded[8..]);

    let decoded = decode_contents(&json!({ "content": wrapped })).unwrap();
    assert_eq!(decoded, "hello world");
}

/// Verify a contents response without a content field is rejected.
#[test]
fn test_decode_contents_requires_content_field() {
    let result = decode_contents(&json!({ "name": "settings.yml" }));
    assert!(matches!(result, Err(Error::InvalidResponse)));
}
