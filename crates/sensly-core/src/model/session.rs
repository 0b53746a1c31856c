// ── Session ──

use std::time::Duration;

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};

use super::monitor::Monitor;

/// The live authentication state of one client.
///
/// Only the session manager writes this. A successful authentication
/// replaces it wholesale; a failed one leaves it untouched.
///
/// Invariant: `authenticated` implies a non-empty `access_token` and a set
/// `last_auth_time`.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub access_token: Option<SecretString>,
    pub user_id: Option<String>,
    pub account_id: Option<String>,
    pub monitors: Vec<Monitor>,
    pub monitor_id: Option<String>,
    pub last_auth_time: Option<DateTime<Utc>>,
    pub authenticated: bool,
}

impl Session {
    /// Authenticated, and the last authentication is younger than `window`.
    pub fn is_fresh(&self, window: Duration, now: DateTime<Utc>) -> bool {
        if !self.authenticated || !self.has_token() {
            return false;
        }
        let Some(at) = self.last_auth_time else {
            return false;
        };
        let Ok(window) = chrono::Duration::from_std(window) else {
            return true;
        };
        now.signed_duration_since(at) < window
    }

    pub fn has_token(&self) -> bool {
        self.access_token
            .as_ref()
            .is_some_and(|t| !t.expose_secret().is_empty())
    }

    /// The selected monitor's summary, if it is in the monitor list.
    pub fn selected_monitor(&self) -> Option<&Monitor> {
        let id = self.monitor_id.as_deref()?;
        self.monitors.iter().find(|m| m.id == id)
    }
}
