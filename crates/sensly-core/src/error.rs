// ── Core error types ──
//
// Client-facing errors from sensly-core. Consumers never see reqwest or
// serde errors directly; `From<sensly_api::Error>` sorts wire failures into
// credential, MFA, transport, and malformed-data buckets.
//
// `CoreError` is `Clone` because one authentication result is shared by
// every caller waiting on it, and errors travel through the event hub.

use thiserror::Error;

pub use sensly_api::MfaFailure;

/// Which bucket of the failure taxonomy an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorCategory {
    Credential,
    MfaRequired,
    Transport,
    MalformedData,
    Client,
}

/// Unified error type for the core crate.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    // ── Authentication errors ────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    Credentials { message: String },

    #[error("Multi-factor authentication failed: {kind}")]
    Mfa { kind: MfaFailure },

    #[error("Invalid TOTP secret: {reason}")]
    InvalidSecret { reason: String },

    #[error("Session expired -- re-authentication required")]
    SessionExpired,

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("No monitor available on this account")]
    NoMonitor,

    // ── Transport errors ─────────────────────────────────────────────
    #[error("Cannot reach Sense service: {reason}")]
    Transport { reason: String },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("HTTP {status}: {reason}")]
    Api { status: u16, reason: String },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Malformed data: {message}")]
    MalformedData { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Credentials { .. } | Self::SessionExpired => ErrorCategory::Credential,
            Self::Mfa { .. } | Self::InvalidSecret { .. } => ErrorCategory::MfaRequired,
            Self::Transport { .. } | Self::Timeout { .. } | Self::Api { .. } => {
                ErrorCategory::Transport
            }
            Self::MalformedData { .. } => ErrorCategory::MalformedData,
            Self::NotAuthenticated | Self::NoMonitor | Self::Config { .. } => {
                ErrorCategory::Client
            }
        }
    }

    /// Returns `true` when the token was refused and a fresh
    /// authentication may fix the call.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::SessionExpired | Self::Api { status: 401, .. })
    }

    /// Actionable guidance for MFA failures.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Mfa {
                kind: MfaFailure::DisabledInConfig,
            } => Some("The account has MFA turned on. Set mfa_enabled = true and provide mfa_secret."),
            Self::Mfa {
                kind: MfaFailure::NoSecret,
            } => Some("Add the base32 TOTP secret from the Sense app as mfa_secret."),
            Self::Mfa {
                kind: MfaFailure::CodeRejected,
            } => Some("Check the TOTP secret and that the system clock is accurate."),
            Self::InvalidSecret { .. } => Some("The TOTP secret must be base32 (A-Z, 2-7)."),
            _ => None,
        }
    }
}

// ── Conversion from wire-layer errors ────────────────────────────────

impl From<sensly_api::Error> for CoreError {
    fn from(err: sensly_api::Error) -> Self {
        match err {
            sensly_api::Error::Authentication { message } => CoreError::Credentials { message },
            sensly_api::Error::Mfa(kind) => CoreError::Mfa { kind },
            sensly_api::Error::SessionExpired => CoreError::SessionExpired,
            sensly_api::Error::InvalidTotpSecret(reason) => CoreError::InvalidSecret { reason },
            sensly_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else if let Some(status) = e.status() {
                    CoreError::Api {
                        status: status.as_u16(),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Transport {
                        reason: e.to_string(),
                    }
                }
            }
            sensly_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            sensly_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            sensly_api::Error::Tls(msg) => CoreError::Transport {
                reason: format!("TLS error: {msg}"),
            },
            sensly_api::Error::Api { status, reason } => CoreError::Api { status, reason },
            sensly_api::Error::WebSocketConnect(reason) => CoreError::Transport {
                reason: format!("WebSocket connection failed: {reason}"),
            },
            sensly_api::Error::Deserialization { message, body: _ } => {
                CoreError::MalformedData { message }
            }
        }
    }
}
