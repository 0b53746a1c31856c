use thiserror::Error;

/// Why the second authentication step could not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MfaFailure {
    /// The service asked for a code, but MFA is switched off in configuration.
    DisabledInConfig,
    /// MFA is enabled but no TOTP secret is configured.
    NoSecret,
    /// The service rejected the submitted code.
    CodeRejected,
}

impl std::fmt::Display for MfaFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::DisabledInConfig => "account requires MFA but mfa_enabled is false",
            Self::NoSecret => "account requires MFA but no TOTP secret is configured",
            Self::CodeRejected => "TOTP code was rejected",
        };
        f.write_str(text)
    }
}

/// Top-level error type for the `sensly-api` crate.
///
/// Covers every failure mode of the wire layer: credential exchange,
/// the MFA step, HTTP transport, response decoding, and the realtime feed.
/// `sensly-core` maps these into the client-facing taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Username/password rejected, or the response was not `authorized`.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The MFA step failed.
    #[error("Multi-factor authentication failed: {0}")]
    Mfa(MfaFailure),

    /// A privileged call was rejected with 401 -- the token is stale.
    #[error("Session expired -- re-authentication required")]
    SessionExpired,

    /// The TOTP shared secret is empty or not valid base32.
    #[error("Invalid TOTP secret: {0}")]
    InvalidTotpSecret(String),

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// TLS setup error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── API ─────────────────────────────────────────────────────────
    /// Non-2xx response. `reason` is the body's `error_reason` when present.
    #[error("HTTP {status}: {reason}")]
    Api { status: u16, reason: String },

    // ── WebSocket ───────────────────────────────────────────────────
    /// Realtime feed connection failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Failed to parse response: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this error indicates the token is no longer
    /// accepted and re-authentication might resolve it.
    pub fn is_auth_expired(&self) -> bool {
        match self {
            Self::SessionExpired => true,
            Self::Api { status, .. } => *status == 401,
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::UNAUTHORIZED),
            _ => false,
        }
    }
}
