//! Shared configuration for the sensly CLI.
//!
//! TOML profiles, credential resolution (env + plaintext), and translation
//! to `sensly_core::ClientConfig`. The CLI layers its flag overrides on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use sensly_core::{
    ActiveDeviceRule, ClientConfig, Credentials, DEFAULT_ACTIVE_THRESHOLD_W, DEFAULT_MAX_DEVICES,
    MAX_DEVICES_LIMIT, TlsMode,
};

/// Accepted polling interval range, in seconds.
pub const POLLING_INTERVAL_RANGE: std::ops::RangeInclusive<u64> = 30..=3600;
const DEFAULT_POLLING_INTERVAL: u64 = 60;

const REDACTED: &str = "********";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("profile '{profile}' not found")]
    UnknownProfile { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named account profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Look up `name`, or the default profile when `name` is `None`.
    pub fn profile(&self, name: Option<&str>) -> Result<(&str, &Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get_key_value(name)
            .map(|(k, v)| (k.as_str(), v))
            .ok_or_else(|| ConfigError::UnknownProfile {
                profile: name.into(),
            })
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default = "default_polling_interval")]
    pub polling_interval: u64,

    #[serde(default = "default_true")]
    pub use_websocket: bool,

    #[serde(default = "default_max_devices")]
    pub max_devices: usize,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            polling_interval: default_polling_interval(),
            use_websocket: true,
            max_devices: default_max_devices(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}
fn default_polling_interval() -> u64 {
    DEFAULT_POLLING_INTERVAL
}
fn default_true() -> bool {
    true
}
fn default_max_devices() -> usize {
    DEFAULT_MAX_DEVICES
}

/// A named Sense account profile.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Account email.
    pub username: Option<String>,

    /// Password (plaintext; prefer `password_env`).
    pub password: Option<String>,

    /// Environment variable name containing the password.
    pub password_env: Option<String>,

    /// Base32 TOTP secret (plaintext; prefer `mfa_secret_env`).
    pub mfa_secret: Option<String>,

    /// Environment variable name containing the TOTP secret.
    pub mfa_secret_env: Option<String>,

    /// `false` refuses an MFA challenge instead of answering it.
    pub mfa_enabled: Option<bool>,

    /// Monitor to use; defaults to the first on the account.
    pub monitor_id: Option<String>,

    /// Directory for the auth cache.
    pub storage_path: Option<PathBuf>,

    /// Trend polling period in seconds (30..=3600).
    pub polling_interval: Option<u64>,

    /// Stream realtime data instead of polling it.
    pub use_websocket: Option<bool>,

    /// Cap on the active-device list (max 50).
    pub max_devices: Option<usize>,

    /// `"power_above"` (default) or `"state_active"`.
    pub active_device_rule: Option<String>,

    /// Watts a device must exceed under `power_above`.
    pub active_threshold: Option<f64>,

    /// Override request timeout in seconds.
    pub timeout: Option<u64>,

    /// Path to a custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override REST base URL.
    pub api_url: Option<String>,

    /// Override realtime feed base URL.
    pub realtime_url: Option<String>,
}

impl Profile {
    /// Copy with plaintext secrets masked, for display.
    pub fn redacted(&self) -> Profile {
        Profile {
            password: self.password.as_ref().map(|_| REDACTED.into()),
            mfa_secret: self.mfa_secret.as_ref().map(|_| REDACTED.into()),
            ..self.clone()
        }
    }
}

/// Render a profile as TOML with secrets masked.
pub fn render_profile(profile: &Profile) -> Result<String, ConfigError> {
    Ok(toml::to_string_pretty(&profile.redacted())?)
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "sensly", "sensly")
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Default auth-cache directory for a profile.
pub fn default_storage_path(profile_name: &str) -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("cache").join(profile_name),
        |dirs| dirs.cache_dir().join(profile_name),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("sensly");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path`, with `SENSLY_`-prefixed environment variables on top.
///
/// Nested keys use a double underscore: `SENSLY_DEFAULTS__TIMEOUT=10`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("SENSLY_").split("__"));

    Ok(figment.extract()?)
}

// ── Credential resolution ───────────────────────────────────────────

/// Read a secret from the named environment variable, else the plaintext
/// value.
fn resolve_secret(env_name: Option<&str>, plaintext: Option<&str>) -> Option<SecretString> {
    env_name
        .and_then(|name| std::env::var(name).ok())
        .filter(|v| !v.is_empty())
        .or_else(|| plaintext.map(str::to_owned))
        .map(SecretString::from)
}

/// Resolve account credentials for a profile.
pub fn resolve_credentials(profile: &Profile, profile_name: &str) -> Result<Credentials, ConfigError> {
    let username = profile
        .username
        .clone()
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ConfigError::NoCredentials {
            profile: profile_name.into(),
        })?;

    let password = resolve_secret(profile.password_env.as_deref(), profile.password.as_deref())
        .ok_or_else(|| ConfigError::NoCredentials {
            profile: profile_name.into(),
        })?;

    Ok(Credentials {
        username,
        password,
        mfa_secret: resolve_secret(
            profile.mfa_secret_env.as_deref(),
            profile.mfa_secret.as_deref(),
        ),
        mfa_enabled: profile.mfa_enabled,
    })
}

// ── Validation ──────────────────────────────────────────────────────

/// Clamp an out-of-range polling interval to the default, with a warning.
pub fn validate_polling_interval(secs: u64) -> Duration {
    if POLLING_INTERVAL_RANGE.contains(&secs) {
        Duration::from_secs(secs)
    } else {
        warn!(
            polling_interval = secs,
            "polling interval must be between 30 and 3600 seconds, using 60"
        );
        Duration::from_secs(DEFAULT_POLLING_INTERVAL)
    }
}

fn parse_rule(profile: &Profile) -> Result<ActiveDeviceRule, ConfigError> {
    let threshold_w = profile
        .active_threshold
        .unwrap_or(DEFAULT_ACTIVE_THRESHOLD_W);
    match profile.active_device_rule.as_deref() {
        None | Some("power_above") => Ok(ActiveDeviceRule::PowerAbove { threshold_w }),
        Some("state_active") => Ok(ActiveDeviceRule::StateActive),
        Some(other) => Err(ConfigError::Validation {
            field: "active_device_rule".into(),
            reason: format!("expected 'power_above' or 'state_active', got '{other}'"),
        }),
    }
}

fn parse_url(field: &str, raw: &str) -> Result<url::Url, ConfigError> {
    raw.parse().map_err(|_| ConfigError::Validation {
        field: field.into(),
        reason: format!("invalid URL: {raw}"),
    })
}

// ── Translation ─────────────────────────────────────────────────────

/// Build a `ClientConfig` from a profile, falling back to `defaults`.
pub fn profile_to_client_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<ClientConfig, ConfigError> {
    let mut config = ClientConfig::new(resolve_credentials(profile, profile_name)?);

    config.monitor_id = profile.monitor_id.clone();
    config.storage_path = Some(
        profile
            .storage_path
            .clone()
            .unwrap_or_else(|| default_storage_path(profile_name)),
    );
    if let Some(raw) = &profile.api_url {
        config.api_url = parse_url("api_url", raw)?;
    }
    if let Some(raw) = &profile.realtime_url {
        config.realtime_url = parse_url("realtime_url", raw)?;
    }
    if let Some(ca) = &profile.ca_cert {
        config.tls = TlsMode::CustomCa(ca.clone());
    }

    config.timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    config.polling_interval = validate_polling_interval(
        profile.polling_interval.unwrap_or(defaults.polling_interval),
    );
    config.websocket_enabled = profile.use_websocket.unwrap_or(defaults.use_websocket);
    config.max_devices = profile
        .max_devices
        .unwrap_or(defaults.max_devices)
        .min(MAX_DEVICES_LIMIT);
    config.active_device_rule = parse_rule(profile)?;

    Ok(config)
}
