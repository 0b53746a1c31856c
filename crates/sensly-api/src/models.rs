// Wire models for the Sense REST API and realtime feed.
//
// Field names mirror the service JSON. Identifiers arrive as numbers on
// some endpoints and strings on others, so they are normalized to `String`.

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(i64),
    Text(String),
}

impl From<RawId> for String {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Number(n) => n.to_string(),
            RawId::Text(s) => s,
        }
    }
}

fn id_string<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
    RawId::deserialize(de).map(String::from)
}

fn opt_id_string<'de, D: Deserializer<'de>>(de: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<RawId>::deserialize(de)?.map(String::from))
}

// ── Authentication ──────────────────────────────────────────────────

/// Body of `POST authenticate` and `POST authenticate/mfa`.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    #[serde(default)]
    pub authorized: bool,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default, deserialize_with = "opt_id_string")]
    pub user_id: Option<String>,
    #[serde(default, deserialize_with = "opt_id_string")]
    pub account_id: Option<String>,
    #[serde(default)]
    pub monitors: Vec<MonitorInfo>,
    /// `"mfa_required"` when the account needs a second factor.
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub mfa_token: Option<String>,
    #[serde(default)]
    pub error_reason: Option<String>,
}

impl AuthResponse {
    /// The MFA session token, if this response is a two-step challenge.
    pub fn mfa_challenge(&self) -> Option<&str> {
        if self.status.as_deref() != Some("mfa_required") {
            return None;
        }
        self.mfa_token.as_deref().filter(|t| !t.is_empty())
    }
}

/// A monitor summary from the authentication response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorInfo {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub serial_number: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl MonitorInfo {
    /// Human-readable name: explicit name, else serial number, else id.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.serial_number.as_deref())
            .unwrap_or(&self.id)
    }
}

/// A successful credential exchange.
#[derive(Debug, Clone)]
pub struct AuthGrant {
    pub access_token: String,
    pub user_id: Option<String>,
    pub account_id: Option<String>,
    pub monitors: Vec<MonitorInfo>,
}

/// Result of the first authentication step.
#[derive(Debug, Clone)]
pub enum AuthOutcome {
    /// Credentials accepted, no second factor needed.
    Authorized(AuthGrant),
    /// The account requires a TOTP code; submit it with this token.
    MfaRequired { mfa_token: String },
}

// ── Devices ─────────────────────────────────────────────────────────

/// A sub-device from `monitors/{id}/devices`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub device_type: Option<String>,
}

// ── Realtime / status ───────────────────────────────────────────────

/// Realtime fields shared by the status endpoint and feed frames.
///
/// Everything is optional; defaults are applied during normalization.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RealtimePayload {
    #[serde(default)]
    pub w: Option<f64>,
    #[serde(default)]
    pub d_w: Option<f64>,
    #[serde(default)]
    pub solar_w: Option<f64>,
    #[serde(default)]
    pub voltage: Option<Vec<f64>>,
    #[serde(default)]
    pub hz: Option<f64>,
    /// Kept raw so one malformed entry does not reject the whole frame.
    #[serde(default)]
    pub devices: Option<serde_json::Value>,
}

/// Body of `app/monitors/{id}/status`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MonitorStatus {
    #[serde(flatten)]
    pub realtime: RealtimePayload,
    #[serde(default)]
    pub daily_usage: Option<f64>,
    #[serde(default)]
    pub daily_production: Option<f64>,
    #[serde(default)]
    pub weekly_usage: Option<f64>,
    #[serde(default)]
    pub monthly_usage: Option<f64>,
    #[serde(default)]
    pub yearly_usage: Option<f64>,
}

/// Envelope of a realtime feed frame.
#[derive(Debug, Deserialize)]
pub struct FeedMessage {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub payload: Option<RealtimePayload>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn numeric_and_string_ids_normalize() {
        let resp: AuthResponse = serde_json::from_value(serde_json::json!({
            "authorized": true,
            "access_token": "t0k",
            "user_id": 1234,
            "account_id": "acct-9",
            "monitors": [{ "id": 55, "serial_number": "N123" }]
        }))
        .unwrap();

        assert_eq!(resp.user_id.as_deref(), Some("1234"));
        assert_eq!(resp.account_id.as_deref(), Some("acct-9"));
        assert_eq!(resp.monitors[0].id, "55");
        assert_eq!(resp.monitors[0].display_name(), "N123");
        assert!(resp.mfa_challenge().is_none());
    }

    #[test]
    fn mfa_challenge_requires_status_and_token() {
        let resp: AuthResponse = serde_json::from_value(serde_json::json!({
            "status": "mfa_required",
            "mfa_token": "mfa-abc",
            "error_reason": "Multi-factor authentication required"
        }))
        .unwrap();
        assert_eq!(resp.mfa_challenge(), Some("mfa-abc"));

        let no_token: AuthResponse =
            serde_json::from_value(serde_json::json!({ "status": "mfa_required" })).unwrap();
        assert!(no_token.mfa_challenge().is_none());
    }

    #[test]
    fn status_flattens_realtime_fields() {
        let status: MonitorStatus = serde_json::from_value(serde_json::json!({
            "w": 1520.4,
            "solar_w": 310.0,
            "voltage": [121.2, 119.8],
            "hz": 59.98,
            "daily_usage": 12.5,
            "weekly_usage": 80.1
        }))
        .unwrap();

        assert_eq!(status.realtime.w, Some(1520.4));
        assert_eq!(status.realtime.voltage.as_deref(), Some(&[121.2, 119.8][..]));
        assert_eq!(status.daily_usage, Some(12.5));
        assert!(status.monthly_usage.is_none());
    }
}
