#![allow(clippy::unwrap_used)]
// Integration tests for `SenseClient` using wiremock.

use secrecy::SecretString;
use serde_json::json;
use tokio_test::{assert_err, assert_ok};
use url::Url;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sensly_api::{AuthOutcome, Error, MfaFailure, SenseClient};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, SenseClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&format!("{}/api/v1/", server.uri())).unwrap();
    let client = SenseClient::with_client(reqwest::Client::new(), base_url);
    (server, client)
}

fn password() -> SecretString {
    SecretString::from("hunter2".to_string())
}

// ── Authentication tests ────────────────────────────────────────────

#[tokio::test]
async fn test_authenticate_success() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/authenticate"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("email=me%40example.com"))
        .and(body_string_contains("password=hunter2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "authorized": true,
            "access_token": "tok-1",
            "user_id": 42,
            "account_id": 7,
            "monitors": [{ "id": 1001, "serial_number": "N1" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = client.authenticate("me@example.com", &password()).await.unwrap();
    match outcome {
        AuthOutcome::Authorized(grant) => {
            assert_eq!(grant.access_token, "tok-1");
            assert_eq!(grant.user_id.as_deref(), Some("42"));
            assert_eq!(grant.monitors.len(), 1);
            assert_eq!(grant.monitors[0].id, "1001");
        }
        other @ AuthOutcome::MfaRequired { .. } => panic!("expected grant, got {other:?}"),
    }
}

#[tokio::test]
async fn test_authenticate_bad_credentials() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/authenticate"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({ "status": "error", "error_reason": "Invalid password" })),
        )
        .mount(&server)
        .await;

    match client.authenticate("me@example.com", &password()).await {
        Err(Error::Authentication { message }) => {
            assert!(message.contains("Invalid password"), "got: {message}");
        }
        other => panic!("expected Authentication error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_authenticate_mfa_challenge() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/authenticate"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "status": "mfa_required",
            "mfa_token": "mfa-xyz",
            "error_reason": "Multi-factor authentication required"
        })))
        .mount(&server)
        .await;

    let outcome = client.authenticate("me@example.com", &password()).await.unwrap();
    assert!(
        matches!(outcome, AuthOutcome::MfaRequired { ref mfa_token } if mfa_token == "mfa-xyz"),
        "expected MFA challenge, got: {outcome:?}"
    );
}

#[tokio::test]
async fn test_authenticate_mfa_step() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/authenticate/mfa"))
        .and(body_string_contains("mfa_token=mfa-xyz"))
        .and(body_string_contains("totp=123456"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "authorized": true,
            "access_token": "tok-mfa",
            "monitors": []
        })))
        .mount(&server)
        .await;

    let grant = assert_ok!(client.authenticate_mfa("mfa-xyz", "123456").await);
    assert_eq!(grant.access_token, "tok-mfa");
}

#[tokio::test]
async fn test_authenticate_mfa_rejected() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/authenticate/mfa"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "error_reason": "Invalid code" })),
        )
        .mount(&server)
        .await;

    let err = assert_err!(client.authenticate_mfa("mfa-xyz", "000000").await);
    assert!(matches!(err, Error::Mfa(MfaFailure::CodeRejected)), "got: {err:?}");
}

// ── Monitor endpoint tests ──────────────────────────────────────────

#[tokio::test]
async fn test_bearer_token_on_status() {
    let (server, client) = setup().await;
    client.set_token(Some(SecretString::from("tok-1".to_string())));

    Mock::given(method("GET"))
        .and(path("/api/v1/app/monitors/1001/status"))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "w": 950.2,
            "voltage": [120.5, 121.0],
            "daily_usage": 4.2
        })))
        .expect(1)
        .mount(&server)
        .await;

    let status = client.monitor_status("1001").await.unwrap();
    assert_eq!(status.realtime.w, Some(950.2));
    assert_eq!(status.daily_usage, Some(4.2));
}

#[tokio::test]
async fn test_devices_null_body_is_empty() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/app/monitors/1001/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_string("null"))
        .mount(&server)
        .await;

    assert!(client.devices("1001").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_devices_alternate_path() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/monitors/1001/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "dev-1", "name": "Fridge", "type": "Refrigerator" }
        ])))
        .mount(&server)
        .await;

    let devices = client.devices_alternate("1001").await.unwrap();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].device_type.as_deref(), Some("Refrigerator"));
}

// ── Error tests ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_session_expired() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client.monitor_status("1001").await.unwrap_err();
    assert!(matches!(err, Error::SessionExpired), "got: {err:?}");
    assert!(err.is_auth_expired());
}

#[tokio::test]
async fn test_error_reason_surfaces() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(503).set_body_json(json!({ "error_reason": "Maintenance" })),
        )
        .mount(&server)
        .await;

    match client.monitor_status("1001").await {
        Err(Error::Api { status, reason }) => {
            assert_eq!(status, 503);
            assert_eq!(reason, "Maintenance");
        }
        other => panic!("expected Api error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_body() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = client.monitor_status("1001").await.unwrap_err();
    assert!(matches!(err, Error::Deserialization { .. }), "got: {err:?}");
}
