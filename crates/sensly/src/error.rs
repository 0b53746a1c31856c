//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use sensly_config::ConfigError;
use sensly_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not reach the Sense service: {reason}")]
    #[diagnostic(
        code(sensly::connection_failed),
        help("Check network access to api.sense.com, or the api_url in your profile.")
    )]
    ConnectionFailed { reason: String },

    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(sensly::timeout),
        help("Increase the timeout with --timeout or retry later.")
    )]
    Timeout { seconds: u64 },

    // ── Authentication ───────────────────────────────────────────────

    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(sensly::auth_failed),
        help("Verify the account email and password for profile '{profile}'.")
    )]
    AuthFailed { message: String, profile: String },

    #[error("{message}")]
    #[diagnostic(code(sensly::mfa))]
    Mfa {
        message: String,
        #[help]
        hint: Option<String>,
    },

    #[error("No credentials configured for profile '{profile}'")]
    #[diagnostic(
        code(sensly::no_credentials),
        help(
            "Add username and password (or password_env) to the profile,\n\
             or set SENSLY_USERNAME and SENSLY_PASSWORD."
        )
    )]
    NoCredentials { profile: String },

    // ── Resources ────────────────────────────────────────────────────

    #[error("No monitor available on this account")]
    #[diagnostic(
        code(sensly::no_monitor),
        help("Run: sensly auth to list the monitors the account can see.")
    )]
    NoMonitor,

    // ── API ──────────────────────────────────────────────────────────

    #[error("API error (HTTP {status}): {reason}")]
    #[diagnostic(code(sensly::api_error))]
    ApiError { status: u16, reason: String },

    #[error("Unexpected response from the Sense service: {message}")]
    #[diagnostic(code(sensly::malformed_data))]
    MalformedData { message: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(sensly::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(sensly::profile_not_found),
        help("Available profiles: {available}\nConfig file: {path}")
    )]
    ProfileNotFound {
        name: String,
        available: String,
        path: String,
    },

    #[error("{message}")]
    #[diagnostic(code(sensly::config))]
    Config { message: String },

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to encode output: {0}")]
    #[diagnostic(code(sensly::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::AuthFailed { .. } | Self::Mfa { .. } | Self::NoCredentials { .. } => {
                exit_code::AUTH
            }
            Self::NoMonitor | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }

    /// Attach the active profile name to a credential failure.
    pub fn with_profile(self, name: &str) -> Self {
        match self {
            Self::AuthFailed { message, .. } => Self::AuthFailed {
                message,
                profile: name.into(),
            },
            other => other,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        let hint = err.hint().map(str::to_owned);
        match err {
            CoreError::Credentials { message } => CliError::AuthFailed {
                message,
                profile: "default".into(),
            },
            CoreError::SessionExpired | CoreError::NotAuthenticated => CliError::AuthFailed {
                message: err.to_string(),
                profile: "default".into(),
            },
            CoreError::Mfa { .. } | CoreError::InvalidSecret { .. } => CliError::Mfa {
                message: err.to_string(),
                hint,
            },
            CoreError::NoMonitor => CliError::NoMonitor,
            CoreError::Transport { reason } => CliError::ConnectionFailed { reason },
            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },
            CoreError::Api { status, reason } => CliError::ApiError { status, reason },
            CoreError::MalformedData { message } => CliError::MalformedData { message },
            CoreError::Config { message } => CliError::Config { message },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::UnknownProfile { profile } => CliError::ProfileNotFound {
                name: profile,
                available: "(none)".into(),
                path: sensly_config::config_path().display().to_string(),
            },
            other => CliError::Config {
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sensly_core::MfaFailure;

    #[test]
    fn mfa_errors_carry_hint_and_auth_exit_code() {
        let err = CliError::from(CoreError::Mfa {
            kind: MfaFailure::NoSecret,
        });
        assert_eq!(err.exit_code(), exit_code::AUTH);
        assert!(matches!(err, CliError::Mfa { hint: Some(_), .. }));
    }

    #[test]
    fn transport_maps_to_connection_exit_code() {
        let err = CliError::from(CoreError::Transport {
            reason: "connection refused".into(),
        });
        assert_eq!(err.exit_code(), exit_code::CONNECTION);
    }

    #[test]
    fn profile_name_is_attached_to_auth_failures() {
        let err = CliError::from(CoreError::Credentials {
            message: "Bad password".into(),
        })
        .with_profile("home");
        assert!(matches!(err, CliError::AuthFailed { ref profile, .. } if profile == "home"));
    }
}
