//! Profile resolution: config file + CLI flag overrides -> `ClientConfig`.

use std::path::PathBuf;

use sensly_config::{Config, Profile};
use sensly_core::ClientConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Config file path: `--config`, else the platform default.
pub fn config_file(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(sensly_config::config_path)
}

pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(sensly_config::load_config_from(&config_file(global))?)
}

/// Active profile name: `--profile`, else the config's default.
pub fn active_profile_name(global: &GlobalOpts, cfg: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| cfg.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// The active profile with CLI flags applied on top.
///
/// An explicitly requested profile must exist; the implicit default may be
/// absent, in which case flags and environment alone supply everything.
pub fn resolve_profile(global: &GlobalOpts, cfg: &Config) -> Result<(String, Profile), CliError> {
    let name = active_profile_name(global, cfg);

    let mut profile = match cfg.profiles.get(&name) {
        Some(p) => p.clone(),
        None if global.profile.is_some() => {
            let mut available: Vec<&str> = cfg.profiles.keys().map(String::as_str).collect();
            available.sort_unstable();
            return Err(CliError::ProfileNotFound {
                name,
                available: if available.is_empty() {
                    "(none)".into()
                } else {
                    available.join(", ")
                },
                path: config_file(global).display().to_string(),
            });
        }
        None => Profile::default(),
    };

    if let Some(ref username) = global.username {
        profile.username = Some(username.clone());
    }
    if let Some(ref password) = global.password {
        profile.password = Some(password.clone());
        profile.password_env = None;
    }
    if let Some(ref secret) = global.mfa_secret {
        profile.mfa_secret = Some(secret.clone());
        profile.mfa_secret_env = None;
    }
    if let Some(ref monitor) = global.monitor {
        profile.monitor_id = Some(monitor.clone());
    }
    if let Some(timeout) = global.timeout {
        profile.timeout = Some(timeout);
    }

    Ok((name, profile))
}

/// Build a `ClientConfig` from the config file, profile, and CLI overrides.
pub fn build_client_config(global: &GlobalOpts) -> Result<(String, ClientConfig), CliError> {
    let cfg = load(global)?;
    let (name, profile) = resolve_profile(global, &cfg)?;
    let client_config = sensly_config::profile_to_client_config(&profile, &name, &cfg.defaults)?;
    Ok((name, client_config))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use clap::Parser;

    use super::*;
    use crate::cli::Cli;

    fn global(args: &[&str]) -> GlobalOpts {
        let mut argv = vec!["sensly"];
        argv.extend_from_slice(args);
        argv.push("auth");
        Cli::try_parse_from(argv).unwrap().global
    }

    fn config_with_home() -> Config {
        let mut cfg = Config::default();
        cfg.profiles.insert(
            "home".into(),
            Profile {
                username: Some("me@example.com".into()),
                monitor_id: Some("1001".into()),
                ..Profile::default()
            },
        );
        cfg
    }

    #[test]
    fn flags_override_profile_fields() {
        let global = global(&["-p", "home", "--monitor", "2002", "--timeout", "5"]);
        let (name, profile) = resolve_profile(&global, &config_with_home()).unwrap();
        assert_eq!(name, "home");
        assert_eq!(profile.username.as_deref(), Some("me@example.com"));
        assert_eq!(profile.monitor_id.as_deref(), Some("2002"));
        assert_eq!(profile.timeout, Some(5));
    }

    #[test]
    fn explicit_missing_profile_is_an_error() {
        let global = global(&["-p", "cabin"]);
        let err = resolve_profile(&global, &config_with_home()).unwrap_err();
        assert!(
            matches!(err, CliError::ProfileNotFound { ref available, .. } if available == "home")
        );
    }

    #[test]
    fn implicit_default_profile_may_be_absent() {
        let global = global(&["--username", "flag@example.com"]);
        let (name, profile) = resolve_profile(&global, &Config::default()).unwrap();
        assert_eq!(name, "default");
        assert_eq!(profile.username.as_deref(), Some("flag@example.com"));
    }
}
