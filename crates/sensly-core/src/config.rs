// ── Runtime client configuration ──
//
// These types describe *how* to talk to the Sense service. They carry
// credential data and tuning, but never read config files.
// The CLI (via sensly-config) constructs a `ClientConfig` and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use url::Url;

use sensly_api::{DEFAULT_API_URL, DEFAULT_REALTIME_URL, ReconnectConfig, TlsMode};

/// Minimum sub-device power, in watts, to count as active.
pub const DEFAULT_ACTIVE_THRESHOLD_W: f64 = 5.0;
/// Default cap on the active-device list.
pub const DEFAULT_MAX_DEVICES: usize = 20;
/// Hard cap on the active-device list.
pub const MAX_DEVICES_LIMIT: usize = 50;

/// Account credentials.
///
/// `mfa_enabled` is tri-state: `Some(false)` refuses an MFA challenge
/// outright, `Some(true)` and `None` both answer it with `mfa_secret`.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
    pub mfa_secret: Option<SecretString>,
    pub mfa_enabled: Option<bool>,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: SecretString) -> Self {
        Self {
            username: username.into(),
            password,
            mfa_secret: None,
            mfa_enabled: None,
        }
    }

    pub fn with_mfa_secret(mut self, secret: SecretString) -> Self {
        self.mfa_secret = Some(secret);
        self
    }
}

/// How a sub-device in a telemetry payload is judged "active".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum ActiveDeviceRule {
    /// Named, numeric `w`, and `w` strictly above the threshold.
    PowerAbove { threshold_w: f64 },
    /// Named, numeric `w`, and `state == "active"`.
    StateActive,
}

impl Default for ActiveDeviceRule {
    fn default() -> Self {
        Self::PowerAbove {
            threshold_w: DEFAULT_ACTIVE_THRESHOLD_W,
        }
    }
}

/// Configuration for one monitor client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub credentials: Credentials,
    /// Monitor to use. `None` selects the first monitor on the account.
    pub monitor_id: Option<String>,
    /// Directory for the auth cache. `None` disables caching.
    pub storage_path: Option<PathBuf>,
    pub api_url: Url,
    pub realtime_url: Url,
    pub tls: TlsMode,
    pub timeout: Duration,
    /// A successful authentication older than this is re-done.
    pub auth_freshness: Duration,
    /// Minimum spacing between realtime REST calls.
    pub realtime_rate_limit: Duration,
    pub reconnect: ReconnectConfig,
    pub active_device_rule: ActiveDeviceRule,
    pub max_devices: usize,
    /// Trend polling period. Zero disables the polling task.
    pub polling_interval: Duration,
    /// Stream realtime data; when off, the polling task also polls realtime.
    pub websocket_enabled: bool,
}

impl ClientConfig {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            monitor_id: None,
            storage_path: None,
            api_url: default_url(DEFAULT_API_URL),
            realtime_url: default_url(DEFAULT_REALTIME_URL),
            tls: TlsMode::System,
            timeout: Duration::from_secs(30),
            auth_freshness: Duration::from_secs(15 * 60),
            realtime_rate_limit: Duration::from_secs(30),
            reconnect: ReconnectConfig::default(),
            active_device_rule: ActiveDeviceRule::default(),
            max_devices: DEFAULT_MAX_DEVICES,
            polling_interval: Duration::from_secs(60),
            websocket_enabled: true,
        }
    }
}

#[allow(clippy::expect_used)]
fn default_url(raw: &str) -> Url {
    Url::parse(raw).expect("built-in URL constant is valid")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_service_limits() {
        let config = ClientConfig::new(Credentials::new(
            "me@example.com",
            SecretString::from("pw".to_string()),
        ));
        assert_eq!(config.auth_freshness, Duration::from_secs(900));
        assert_eq!(config.realtime_rate_limit, Duration::from_secs(30));
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.api_url.as_str(), DEFAULT_API_URL);
        assert_eq!(
            config.active_device_rule,
            ActiveDeviceRule::PowerAbove { threshold_w: 5.0 }
        );
    }

    #[test]
    fn active_rule_deserializes_from_tagged_form() {
        let rule: ActiveDeviceRule =
            serde_json::from_str(r#"{"rule":"power_above","threshold_w":10.0}"#).unwrap();
        assert_eq!(rule, ActiveDeviceRule::PowerAbove { threshold_w: 10.0 });

        let rule: ActiveDeviceRule = serde_json::from_str(r#"{"rule":"state_active"}"#).unwrap();
        assert_eq!(rule, ActiveDeviceRule::StateActive);
    }
}
