// ── Session manager ──
//
// Owns the credentials and the one live `Session`, and drives the
// authentication state machine:
//
//   Unauthenticated -> Authenticating -> Authenticated
//                                     -> MfaPending -> Authenticated
//                                                   -> AuthFailed
//                                     -> AuthFailed
//
// Only one attempt runs at a time. Callers that arrive while an attempt
// is in flight wait for it and share its result instead of starting a
// second credential exchange. Every installed token gets a new
// generation, so a late refusal of an older token cannot wipe out the
// session that replaced it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use sensly_api::{AuthGrant, AuthOutcome, SenseClient, totp};

use crate::cache::{AuthCache, CachedAuth};
use crate::config::{ClientConfig, Credentials};
use crate::error::{CoreError, MfaFailure};
use crate::events::{EventHub, SenseEvent};
use crate::model::{Monitor, Session};

// ── AuthState ────────────────────────────────────────────────────

/// Authentication state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum AuthState {
    Unauthenticated,
    Authenticating,
    MfaPending,
    Authenticated,
    AuthFailed,
}

// ── SessionManager ───────────────────────────────────────────────

/// Authenticates against the service and keeps the session fresh.
///
/// Shared between the poller and the streaming client via `Arc`.
pub struct SessionManager {
    client: Arc<SenseClient>,
    credentials: Credentials,
    mfa_secret: RwLock<Option<SecretString>>,
    configured_monitor: Option<String>,
    freshness: Duration,
    cache: Option<AuthCache>,
    session: RwLock<Session>,
    state: watch::Sender<AuthState>,
    events: EventHub,
    /// Result of the most recent attempt, guarded so attempts serialize.
    flight: Mutex<Result<(), CoreError>>,
    /// Count of completed attempts.
    attempts: AtomicU64,
    /// Bumped each time a token is installed.
    generation: AtomicU64,
}

impl SessionManager {
    /// Build the manager and restore a fresh cached session, if any.
    pub fn new(client: Arc<SenseClient>, config: &ClientConfig, events: EventHub) -> Self {
        let (state, _) = watch::channel(AuthState::Unauthenticated);
        let manager = Self {
            client,
            mfa_secret: RwLock::new(config.credentials.mfa_secret.clone()),
            credentials: config.credentials.clone(),
            configured_monitor: config.monitor_id.clone(),
            freshness: config.auth_freshness,
            cache: AuthCache::new(config.storage_path.as_deref()),
            session: RwLock::new(Session::default()),
            state,
            events,
            flight: Mutex::new(Err(CoreError::NotAuthenticated)),
            attempts: AtomicU64::new(0),
            generation: AtomicU64::new(0),
        };
        manager.restore_cached();
        manager
    }

    fn restore_cached(&self) {
        let Some(record) = self.cache.as_ref().and_then(AuthCache::load) else {
            return;
        };

        let restored = Session {
            access_token: Some(SecretString::from(record.access_token)),
            user_id: record.user_id,
            account_id: record.account_id,
            monitors: record.monitors,
            monitor_id: self.configured_monitor.clone().or(record.monitor_id),
            last_auth_time: Some(record.last_auth_time),
            authenticated: true,
        };

        if !restored.is_fresh(self.freshness, Utc::now()) {
            debug!(
                last_auth_time = %record.last_auth_time,
                "cached auth is stale, ignoring"
            );
            return;
        }

        info!(monitor_id = ?restored.monitor_id, "restored cached session");
        self.replace_session(restored);
        self.state.send_replace(AuthState::Authenticated);
    }

    // ── State accessors ──────────────────────────────────────────

    pub fn state(&self) -> AuthState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// `Authenticated` state with a live session.
    pub fn is_authenticated(&self) -> bool {
        self.state() == AuthState::Authenticated && self.read_session().authenticated
    }

    /// Authenticated and younger than the freshness window.
    pub fn is_fresh(&self) -> bool {
        self.state() == AuthState::Authenticated
            && self.read_session().is_fresh(self.freshness, Utc::now())
    }

    /// A copy of the current session.
    pub fn session(&self) -> Session {
        self.read_session().clone()
    }

    pub fn monitor_id(&self) -> Option<String> {
        self.read_session().monitor_id.clone()
    }

    pub fn access_token(&self) -> Option<SecretString> {
        self.read_session().access_token.clone()
    }

    /// Replace the TOTP secret used by the next MFA step.
    pub fn set_mfa_secret(&self, secret: Option<SecretString>) {
        *self
            .mfa_secret
            .write()
            .unwrap_or_else(PoisonError::into_inner) = secret;
    }

    /// Generation of the installed token. Read it before a privileged
    /// call and hand it to [`invalidate`](Self::invalidate) on refusal.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Mark the session dead after the service refused the token of
    /// `generation`.
    ///
    /// A refusal for a token that has since been replaced is ignored.
    /// Token and identifiers stay in place until the next successful
    /// authentication replaces them.
    pub fn invalidate(&self, generation: u64) {
        let was_live = {
            let mut session = self.write_session();
            if self.generation() != generation {
                debug!(generation, "refused token already replaced, keeping session");
                return;
            }
            std::mem::replace(&mut session.authenticated, false)
        };
        if was_live {
            info!("session invalidated, re-authentication required");
        }
        self.state.send_replace(AuthState::Unauthenticated);
    }

    // ── Authentication ───────────────────────────────────────────

    /// Run a full authentication, joining one already in flight.
    pub async fn authenticate(&self) -> Result<(), CoreError> {
        self.single_flight(true).await
    }

    /// Authenticate only when the session is missing or stale.
    pub async fn ensure_authenticated(&self) -> Result<(), CoreError> {
        if self.is_fresh() {
            return Ok(());
        }
        debug!("session missing or stale, authenticating");
        self.single_flight(false).await
    }

    async fn single_flight(&self, force: bool) -> Result<(), CoreError> {
        let seen = self.attempts.load(Ordering::Acquire);
        let mut last = self.flight.lock().await;

        if self.attempts.load(Ordering::Acquire) != seen {
            debug!("joined in-flight authentication");
            return last.clone();
        }
        if !force && self.is_fresh() {
            return Ok(());
        }

        let result = self.attempt().await;
        last.clone_from(&result);
        self.attempts.fetch_add(1, Ordering::Release);
        result
    }

    async fn attempt(&self) -> Result<(), CoreError> {
        self.state.send_replace(AuthState::Authenticating);
        debug!(username = %self.credentials.username, "authenticating");

        match self.exchange().await {
            Ok(grant) => {
                self.install(grant);
                self.state.send_replace(AuthState::Authenticated);
                info!(monitor_id = ?self.monitor_id(), "authentication successful");
                self.events.emit(SenseEvent::Authenticated);
                Ok(())
            }
            Err(error) => {
                warn!(error = %error, "authentication failed");
                self.write_session().authenticated = false;
                self.state.send_replace(AuthState::AuthFailed);
                self.events.emit(SenseEvent::AuthenticationFailed {
                    error: error.clone(),
                });
                Err(error)
            }
        }
    }

    async fn exchange(&self) -> Result<AuthGrant, CoreError> {
        let outcome = self
            .client
            .authenticate(&self.credentials.username, &self.credentials.password)
            .await?;

        match outcome {
            AuthOutcome::Authorized(grant) => Ok(grant),
            AuthOutcome::MfaRequired { mfa_token } => self.complete_mfa(&mfa_token).await,
        }
    }

    async fn complete_mfa(&self, mfa_token: &str) -> Result<AuthGrant, CoreError> {
        if self.credentials.mfa_enabled == Some(false) {
            return Err(CoreError::Mfa {
                kind: MfaFailure::DisabledInConfig,
            });
        }

        self.state.send_replace(AuthState::MfaPending);
        debug!("service requested a second factor");

        let secret = self
            .mfa_secret
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(CoreError::Mfa {
                kind: MfaFailure::NoSecret,
            })?;
        let code = totp::generate_now(secret.expose_secret())?;

        Ok(self.client.authenticate_mfa(mfa_token, &code).await?)
    }

    /// Replace the session with a fresh grant and persist it.
    fn install(&self, grant: AuthGrant) {
        let monitors: Vec<Monitor> = grant.monitors.into_iter().map(Monitor::from).collect();
        let monitor_id = self
            .configured_monitor
            .clone()
            .or_else(|| self.monitor_id())
            .or_else(|| monitors.first().map(|m| m.id.clone()));
        let now = Utc::now();

        if let Some(cache) = &self.cache {
            cache.save(&CachedAuth {
                access_token: grant.access_token.clone(),
                user_id: grant.user_id.clone(),
                account_id: grant.account_id.clone(),
                monitor_id: monitor_id.clone(),
                last_auth_time: now,
                monitors: monitors.clone(),
            });
        }

        self.replace_session(Session {
            access_token: Some(SecretString::from(grant.access_token)),
            user_id: grant.user_id,
            account_id: grant.account_id,
            monitors,
            monitor_id,
            last_auth_time: Some(now),
            authenticated: true,
        });
    }

    /// Install `session` and its token under a new generation.
    fn replace_session(&self, session: Session) {
        let mut current = self.write_session();
        self.client.set_token(session.access_token.clone());
        *current = session;
        self.generation.fetch_add(1, Ordering::Release);
    }

    fn read_session(&self) -> std::sync::RwLockReadGuard<'_, Session> {
        self.session.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_session(&self) -> std::sync::RwLockWriteGuard<'_, Session> {
        self.session.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use url::Url;

    use super::*;

    fn manager(config: &ClientConfig) -> SessionManager {
        let client = SenseClient::new(
            Url::parse("http://127.0.0.1:9/").unwrap(),
            &sensly_api::TransportConfig::default(),
        )
        .unwrap();
        SessionManager::new(Arc::new(client), config, EventHub::new())
    }

    fn config() -> ClientConfig {
        ClientConfig::new(Credentials::new(
            "me@example.com",
            SecretString::from("pw".to_string()),
        ))
    }

    #[test]
    fn starts_unauthenticated() {
        let m = manager(&config());
        assert_eq!(m.state(), AuthState::Unauthenticated);
        assert!(!m.is_authenticated());
        assert!(m.session().access_token.is_none());
    }

    #[test]
    fn restores_fresh_cache_with_configured_monitor() {
        let dir = tempfile::tempdir().unwrap();
        AuthCache::new(Some(dir.path())).unwrap().save(&CachedAuth {
            access_token: "cached".into(),
            user_id: None,
            account_id: None,
            monitor_id: Some("cached-monitor".into()),
            last_auth_time: Utc::now(),
            monitors: Vec::new(),
        });

        let mut config = config();
        config.storage_path = Some(dir.path().to_path_buf());
        config.monitor_id = Some("configured".into());

        let m = manager(&config);
        assert_eq!(m.state(), AuthState::Authenticated);
        assert!(m.is_fresh());
        assert_eq!(m.monitor_id().as_deref(), Some("configured"));
        assert_eq!(m.access_token().unwrap().expose_secret(), "cached");
    }

    #[test]
    fn invalidate_keeps_identifiers() {
        let dir = tempfile::tempdir().unwrap();
        AuthCache::new(Some(dir.path())).unwrap().save(&CachedAuth {
            access_token: "cached".into(),
            user_id: Some("42".into()),
            account_id: None,
            monitor_id: Some("1001".into()),
            last_auth_time: Utc::now(),
            monitors: Vec::new(),
        });
        let mut config = config();
        config.storage_path = Some(dir.path().to_path_buf());

        let m = manager(&config);
        m.invalidate(m.generation());

        assert_eq!(m.state(), AuthState::Unauthenticated);
        assert!(!m.is_authenticated());
        let session = m.session();
        assert!(!session.authenticated);
        assert_eq!(session.user_id.as_deref(), Some("42"));
        assert_eq!(session.monitor_id.as_deref(), Some("1001"));
    }

    #[test]
    fn refusal_of_replaced_token_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        AuthCache::new(Some(dir.path())).unwrap().save(&CachedAuth {
            access_token: "cached".into(),
            user_id: None,
            account_id: None,
            monitor_id: Some("1001".into()),
            last_auth_time: Utc::now(),
            monitors: Vec::new(),
        });
        let mut config = config();
        config.storage_path = Some(dir.path().to_path_buf());

        let m = manager(&config);
        assert_eq!(m.generation(), 1);

        m.invalidate(0);
        assert!(m.is_authenticated());
        assert_eq!(m.state(), AuthState::Authenticated);

        m.invalidate(1);
        assert!(!m.is_authenticated());
    }

    #[test]
    fn state_names() {
        assert_eq!(AuthState::MfaPending.to_string(), "mfa_pending");
        assert_eq!(AuthState::AuthFailed.to_string(), "auth_failed");
    }
}
