#![allow(clippy::unwrap_used, dead_code)]
// Shared fixtures for sensly-core integration tests.

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use serde_json::json;
use tokio::sync::broadcast;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sensly_core::{ClientConfig, Credentials, SenseEvent, SenseMonitor};

pub const MONITOR_ID: &str = "1001";
pub const TOTP_SECRET: &str = "JBSWY3DPEHPK3PXP";

pub fn config(server: &MockServer) -> ClientConfig {
    let mut config = ClientConfig::new(Credentials::new(
        "me@example.com",
        SecretString::from("hunter2".to_string()),
    ));
    config.api_url = Url::parse(&format!("{}/api/v1/", server.uri())).unwrap();
    config
}

pub fn monitor(config: ClientConfig) -> SenseMonitor {
    SenseMonitor::new(config).unwrap()
}

pub fn grant(token: &str) -> serde_json::Value {
    json!({
        "authorized": true,
        "access_token": token,
        "user_id": 42,
        "account_id": 7,
        "monitors": [{ "id": 1001, "serial_number": "N1" }]
    })
}

pub fn auth_mock(token: &str) -> Mock {
    Mock::given(method("POST"))
        .and(path("/api/v1/authenticate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(grant(token)))
}

pub fn mfa_challenge_mock() -> Mock {
    Mock::given(method("POST"))
        .and(path("/api/v1/authenticate"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "status": "mfa_required",
            "mfa_token": "mfa-1",
            "error_reason": "Multi-factor authentication required"
        })))
}

pub fn status_path() -> String {
    format!("/api/v1/app/monitors/{MONITOR_ID}/status")
}

/// Receive events until one named `name` arrives.
pub async fn next_event(
    rx: &mut broadcast::Receiver<Arc<SenseEvent>>,
    name: &str,
) -> Arc<SenseEvent> {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = rx.recv().await.unwrap();
            if event.name() == name {
                return event;
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {name}"))
}
