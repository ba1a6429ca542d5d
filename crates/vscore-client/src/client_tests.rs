//! Tests for ApiClient against a mock backend.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vscore_models::{ImportLinkRequest, JobStatus, SequenceId, SubmitScriptRequest};

use crate::client::{ApiClient, REQUEST_ID_HEADER};
use crate::config::ClientConfig;
use crate::credentials::{Anonymous, Credential, CredentialProvider, StaticToken};
use crate::error::{ClientError, ClientResult};
use crate::resolve::{RedirectProvider, ResolveProvider};

// =============================================================================
// Test Helpers
// =============================================================================

fn client_for(server: &MockServer, provider: Arc<dyn CredentialProvider>) -> ApiClient {
    let config = ClientConfig::with_base_url(&server.uri())
        .unwrap()
        .with_request_timeout(Duration::from_millis(300));
    ApiClient::new(config, provider).unwrap()
}

/// Hands out `token-1`, `token-2`, ... on each refresh.
struct Rotating(AtomicU32);

#[async_trait]
impl CredentialProvider for Rotating {
    async fn credential(&self) -> ClientResult<Option<Credential>> {
        let n = self.0.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Some(Credential::bearer(format!("token-{}", n))))
    }
}

// =============================================================================
// Job Status
// =============================================================================

#[tokio::test]
async fn test_get_job_status_completed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/analyses/42/status"))
        .and(header("Authorization", "Bearer session-abc"))
        .and(header_exists(REQUEST_ID_HEADER))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "completed",
            "overall_score": 87,
            "insights": ["strong hook"]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Arc::new(StaticToken::new("session-abc")));
    let job = client.get_job_status(&SequenceId::from(42)).await.unwrap();

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.sequence_id.as_str(), "42");
    assert_eq!(job.overall_score(), Some(87.0));
}

#[tokio::test]
async fn test_get_job_status_in_progress_without_credential() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/analyses/7/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "processing" })))
        .mount(&server)
        .await;

    let client = client_for(&server, Arc::new(Anonymous));
    let job = client.get_job_status(&SequenceId::from(7)).await.unwrap();

    assert_eq!(job.status, JobStatus::Processing);
    assert!(job.result.is_none());
}

#[tokio::test]
async fn test_get_job_status_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = client_for(&server, Arc::new(Anonymous));
    let err = client.get_job_status(&SequenceId::from(1)).await.unwrap_err();

    assert!(matches!(err, ClientError::NotFound(_)));
    assert_eq!(err.http_status(), Some(404));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_server_error_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let client = client_for(&server, Arc::new(Anonymous));
    let err = client.get_job_status(&SequenceId::from(1)).await.unwrap_err();

    assert!(matches!(err, ClientError::Server(503, _)));
    assert_eq!(err.http_status(), Some(503));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_rate_limit_honors_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "3"))
        .mount(&server)
        .await;

    let client = client_for(&server, Arc::new(Anonymous));
    let err = client.get_job_status(&SequenceId::from(1)).await.unwrap_err();

    assert_eq!(err.retry_after_ms(), Some(3000));
}

#[tokio::test]
async fn test_garbled_body_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&server)
        .await;

    let client = client_for(&server, Arc::new(Anonymous));
    let err = client.get_job_status(&SequenceId::from(1)).await.unwrap_err();

    assert!(matches!(err, ClientError::InvalidResponse(_)));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_slow_backend_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "status": "queued" }))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let client = client_for(&server, Arc::new(Anonymous));
    let err = client.get_job_status(&SequenceId::from(1)).await.unwrap_err();

    assert!(matches!(err, ClientError::Timeout(_)));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_unauthorized_refreshes_credential_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("Authorization", "Bearer token-1"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(header("Authorization", "Bearer token-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "queued" })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Arc::new(Rotating(AtomicU32::new(0))));
    let job = client.get_job_status(&SequenceId::from(5)).await.unwrap();

    assert_eq!(job.status, JobStatus::Queued);
}

#[tokio::test]
async fn test_persistent_unauthorized_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;

    let client = client_for(&server, Arc::new(Rotating(AtomicU32::new(0))));
    let err = client.get_job_status(&SequenceId::from(5)).await.unwrap_err();

    assert!(matches!(err, ClientError::Unauthorized(_)));
}

// =============================================================================
// Submissions
// =============================================================================

#[tokio::test]
async fn test_submit_script_returns_queued_job() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/analyses/script"))
        .and(body_partial_json(json!({ "script": "POV: you finally..." })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "an_01H",
            "sequence_id": 1043,
            "status": "queued"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Arc::new(StaticToken::new("t")));
    let job = client
        .submit_script(&SubmitScriptRequest::new("POV: you finally..."))
        .await
        .unwrap();

    assert_eq!(job.sequence_id, SequenceId::from(1043));
    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(job.id.unwrap().as_str(), "an_01H");
}

#[tokio::test]
async fn test_submission_validated_before_sending() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_for(&server, Arc::new(Anonymous));

    let err = client.submit_script(&SubmitScriptRequest::new("  ")).await.unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)));

    let err = client
        .import_link(&ImportLinkRequest::new("file:///etc/passwd"))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)));
}

#[tokio::test]
async fn test_import_link_rejected_by_backend() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/analyses/link"))
        .respond_with(ResponseTemplate::new(422).set_body_string("unsupported platform"))
        .mount(&server)
        .await;

    let client = client_for(&server, Arc::new(Anonymous));
    let err = client
        .import_link(&ImportLinkRequest::new("https://example.com/v/1"))
        .await
        .unwrap_err();

    match err {
        ClientError::RequestFailed(msg) => assert!(msg.contains("unsupported platform")),
        other => panic!("unexpected error: {:?}", other),
    }
}

// =============================================================================
// Redirect resolution
// =============================================================================

#[tokio::test]
async fn test_redirect_provider_follows_to_final_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/s/abc"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("Location", &*format!("{}/video/99", server.uri())),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/video/99"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let provider = RedirectProvider::new(Duration::from_secs(1)).unwrap();

    let resolved = provider.resolve(&format!("{}/s/abc", server.uri())).await.unwrap();
    assert_eq!(resolved, Some(format!("{}/video/99", server.uri())));

    let unchanged = provider.resolve(&format!("{}/video/99", server.uri())).await.unwrap();
    assert_eq!(unchanged, None);
}
