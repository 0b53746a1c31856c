// Sense REST API HTTP client
//
// Wraps `reqwest::Client` with Sense URL construction, bearer-token
// injection, and response classification. The credential exchange lives
// here too because both steps share the form-encoded body shape and the
// `error_reason` envelope.

use std::sync::{PoisonError, RwLock};

use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use url::Url;

use crate::error::{Error, MfaFailure};
use crate::models::{AuthGrant, AuthOutcome, AuthResponse, DeviceInfo, MonitorStatus};
use crate::transport::TransportConfig;

/// Default REST base URL.
pub const DEFAULT_API_URL: &str = "https://api.sense.com/apiservice/api/v1/";

/// Error body shape used by every endpoint.
#[derive(serde::Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error_reason: Option<String>,
}

/// Raw HTTP client for the Sense REST API.
///
/// Holds at most one bearer token. The token is set by whoever owns the
/// session (see `sensly-core`); this type never decides when to refresh it.
pub struct SenseClient {
    http: reqwest::Client,
    base_url: Url,
    timeout_secs: u64,
    token: RwLock<Option<SecretString>>,
}

impl SenseClient {
    /// Create a client from a `TransportConfig`.
    ///
    /// `base_url` is the API root; a trailing slash is added if missing so
    /// relative endpoint paths join underneath it.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            http,
            base_url: with_trailing_slash(base_url),
            timeout_secs: transport.timeout.as_secs(),
            token: RwLock::new(None),
        })
    }

    /// Create a client around a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url: with_trailing_slash(base_url),
            timeout_secs: 30,
            token: RwLock::new(None),
        }
    }

    /// The API base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── Token management ─────────────────────────────────────────────

    /// Replace (or clear) the bearer token used on privileged calls.
    pub fn set_token(&self, token: Option<SecretString>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = token;
    }

    /// Whether a bearer token is currently installed.
    pub fn has_token(&self) -> bool {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let guard = self.token.read().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(token) => builder.bearer_auth(token.expose_secret()),
            None => builder,
        }
    }

    // ── URL builders ─────────────────────────────────────────────────

    pub(crate) fn endpoint(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path)?)
    }

    // ── Authentication ───────────────────────────────────────────────

    /// First authentication step: exchange email + password.
    ///
    /// Returns [`AuthOutcome::MfaRequired`] when the service answers with
    /// `status: mfa_required` and an `mfa_token`, regardless of HTTP status.
    pub async fn authenticate(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<AuthOutcome, Error> {
        let url = self.endpoint("authenticate")?;
        debug!("authenticating at {}", url);

        let resp = self
            .http
            .post(url)
            .form(&[("email", email), ("password", password.expose_secret())])
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| self.transport_error(e))?;
        let parsed = serde_json::from_str::<AuthResponse>(&body);

        if let Ok(ref auth) = parsed {
            if let Some(mfa_token) = auth.mfa_challenge() {
                debug!("service requested a second factor");
                return Ok(AuthOutcome::MfaRequired {
                    mfa_token: mfa_token.to_owned(),
                });
            }
        }

        if !status.is_success() {
            let reason = parsed
                .ok()
                .and_then(|a| a.error_reason)
                .unwrap_or_else(|| "Unknown error".into());
            return Err(if status.is_client_error() {
                Error::Authentication {
                    message: format!("HTTP {}: {reason}", status.as_u16()),
                }
            } else {
                Error::Api {
                    status: status.as_u16(),
                    reason,
                }
            });
        }

        let auth = parsed.map_err(|e| deserialization_error(&e, &body))?;
        into_grant(auth).map(AuthOutcome::Authorized)
    }

    /// Second authentication step: submit the MFA session token and a code.
    pub async fn authenticate_mfa(&self, mfa_token: &str, totp: &str) -> Result<AuthGrant, Error> {
        let url = self.endpoint("authenticate/mfa")?;
        debug!("submitting MFA code at {}", url);

        let resp = self
            .http
            .post(url)
            .form(&[("mfa_token", mfa_token), ("totp", totp)])
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| self.transport_error(e))?;

        if status.is_client_error() {
            debug!(status = status.as_u16(), "MFA code rejected");
            return Err(Error::Mfa(MfaFailure::CodeRejected));
        }
        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                reason: error_reason(&body),
            });
        }

        let auth: AuthResponse =
            serde_json::from_str(&body).map_err(|e| deserialization_error(&e, &body))?;
        if !auth.authorized {
            return Err(Error::Mfa(MfaFailure::CodeRejected));
        }
        into_grant(auth)
    }

    // ── Monitor endpoints ────────────────────────────────────────────

    /// `GET app/monitors/{id}/devices`
    pub async fn devices(&self, monitor_id: &str) -> Result<Vec<DeviceInfo>, Error> {
        let url = self.endpoint(&format!("app/monitors/{monitor_id}/devices"))?;
        let devices: Option<Vec<DeviceInfo>> = self.get(url).await?;
        Ok(devices.unwrap_or_default())
    }

    /// `GET monitors/{id}/devices` -- the older path some accounts still serve.
    pub async fn devices_alternate(&self, monitor_id: &str) -> Result<Vec<DeviceInfo>, Error> {
        let url = self.endpoint(&format!("monitors/{monitor_id}/devices"))?;
        let devices: Option<Vec<DeviceInfo>> = self.get(url).await?;
        Ok(devices.unwrap_or_default())
    }

    /// `GET app/monitors/{id}/status` -- realtime and trend snapshot.
    pub async fn monitor_status(&self, monitor_id: &str) -> Result<MonitorStatus, Error> {
        let url = self.endpoint(&format!("app/monitors/{monitor_id}/status"))?;
        self.get(url).await
    }

    // ── Request helpers ──────────────────────────────────────────────

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!("GET {}", url);

        let resp = self
            .authorize(self.http.get(url))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        self.parse_response(resp).await
    }

    async fn parse_response<T: DeserializeOwned>(&self, resp: reqwest::Response) -> Result<T, Error> {
        let status = resp.status();
        let body = resp.text().await.map_err(|e| self.transport_error(e))?;
        trace!(status = status.as_u16(), len = body.len(), "response received");

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::SessionExpired);
        }
        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                reason: error_reason(&body),
            });
        }

        serde_json::from_str(&body).map_err(|e| deserialization_error(&e, &body))
    }

    fn transport_error(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Timeout {
                timeout_secs: self.timeout_secs,
            }
        } else {
            Error::Transport(err)
        }
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn error_reason(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error_reason)
        .unwrap_or_else(|| "Unknown error".into())
}

fn deserialization_error(err: &serde_json::Error, body: &str) -> Error {
    let preview: String = body.chars().take(200).collect();
    Error::Deserialization {
        message: format!("{err} (body preview: {preview:?})"),
        body: body.to_owned(),
    }
}

fn into_grant(auth: AuthResponse) -> Result<AuthGrant, Error> {
    let token = auth.access_token.filter(|t| !t.is_empty());
    match token {
        Some(access_token) if auth.authorized => Ok(AuthGrant {
            access_token,
            user_id: auth.user_id,
            account_id: auth.account_id,
            monitors: auth.monitors,
        }),
        _ => Err(Error::Authentication {
            message: auth
                .error_reason
                .unwrap_or_else(|| "invalid credentials".into()),
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gains_trailing_slash() {
        let client = SenseClient::with_client(
            reqwest::Client::new(),
            Url::parse("https://api.example.com/apiservice/api/v1").unwrap(),
        );
        assert_eq!(
            client.endpoint("authenticate").unwrap().as_str(),
            "https://api.example.com/apiservice/api/v1/authenticate"
        );
    }

    #[test]
    fn error_reason_falls_back() {
        assert_eq!(error_reason(r#"{"error_reason":"bad"}"#), "bad");
        assert_eq!(error_reason("<html>"), "Unknown error");
    }

    #[test]
    fn unauthorized_response_is_not_a_grant() {
        let auth: AuthResponse = serde_json::from_value(serde_json::json!({
            "authorized": false,
            "error_reason": "Invalid password"
        }))
        .unwrap();
        match into_grant(auth) {
            Err(Error::Authentication { message }) => assert_eq!(message, "Invalid password"),
            other => panic!("expected Authentication error, got {other:?}"),
        }
    }
}
