// ── SenseMonitor facade ──
//
// Full lifecycle for one monitor: authentication, REST refreshes, the
// realtime stream, and the periodic polling task. Consumers talk to this
// type and the event hub, never to the components directly.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use sensly_api::{SenseClient, TransportConfig};

use crate::config::ClientConfig;
use crate::error::CoreError;
use crate::events::{EventHub, SenseEvent};
use crate::model::{Device, Monitor, RealtimeSample, Session, TrendSample};
use crate::poller::Poller;
use crate::session::{AuthState, SessionManager};
use crate::store::TelemetryStore;
use crate::stream::{StreamClient, StreamState};

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<MonitorInner>`. Does nothing on
/// construction apart from restoring a cached session; call
/// [`start()`](Self::start) to authenticate and spin up background work,
/// or drive the individual operations yourself.
#[derive(Clone)]
pub struct SenseMonitor {
    inner: Arc<MonitorInner>,
}

struct MonitorInner {
    config: ClientConfig,
    session: Arc<SessionManager>,
    poller: Poller,
    stream: StreamClient,
    store: Arc<TelemetryStore>,
    events: EventHub,
    /// Present between `start()` and `shutdown()`.
    background: Mutex<Option<Background>>,
}

/// Tasks spawned by one `start()`, cancelled together.
struct Background {
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl SenseMonitor {
    pub fn new(config: ClientConfig) -> Result<Self, CoreError> {
        let transport = TransportConfig {
            tls: config.tls.clone(),
            timeout: config.timeout,
        };
        let client = SenseClient::new(config.api_url.clone(), &transport)?;
        Ok(Self::with_client(config, client))
    }

    /// Build around an existing API client.
    pub fn with_client(config: ClientConfig, client: SenseClient) -> Self {
        let client = Arc::new(client);
        let events = EventHub::new();
        let store = Arc::new(TelemetryStore::new());
        let session = Arc::new(SessionManager::new(
            Arc::clone(&client),
            &config,
            events.clone(),
        ));
        let poller = Poller::new(
            client,
            Arc::clone(&session),
            Arc::clone(&store),
            events.clone(),
            &config,
        );
        let stream = StreamClient::new(
            Arc::clone(&session),
            Arc::clone(&store),
            events.clone(),
            &config,
        );

        Self {
            inner: Arc::new(MonitorInner {
                config,
                session,
                poller,
                stream,
                store,
                events,
                background: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Authenticate, discover devices, take the first snapshots, open the
    /// stream (when enabled), and spawn the polling task.
    ///
    /// Only an authentication failure is returned; refresh and stream
    /// failures are reported through events. Calling this twice is a
    /// no-op; after [`shutdown()`](Self::shutdown) it starts afresh.
    pub async fn start(&self) -> Result<(), CoreError> {
        let mut background = self.inner.background.lock().await;
        if background.is_some() {
            debug!("monitor already started");
            return Ok(());
        }

        self.ensure_authenticated().await?;
        self.refresh_devices().await;
        let _ = self.refresh_trends().await;

        let config = &self.inner.config;
        if config.websocket_enabled {
            self.open_stream().await?;
        } else {
            let _ = self.refresh_realtime().await;
        }

        let cancel = CancellationToken::new();
        let mut handles = Vec::new();
        if config.polling_interval.is_zero() {
            debug!("polling disabled");
        } else {
            handles.push(tokio::spawn(polling_task(
                self.clone(),
                config.polling_interval,
                cancel.clone(),
            )));
        }
        *background = Some(Background { cancel, handles });

        info!(
            monitor_id = ?self.inner.session.monitor_id(),
            websocket = config.websocket_enabled,
            "monitor started"
        );
        Ok(())
    }

    /// Close the stream and stop the polling task.
    ///
    /// In-flight REST calls finish or time out on their own.
    pub async fn shutdown(&self) {
        let background = self.inner.background.lock().await.take();
        self.inner.stream.close_stream().await;

        if let Some(Background { cancel, handles }) = background {
            cancel.cancel();
            for handle in handles {
                let _ = handle.await;
            }
        }
        debug!("monitor shut down");
    }

    // ── Authentication ───────────────────────────────────────────

    pub async fn authenticate(&self) -> Result<(), CoreError> {
        self.inner.session.authenticate().await
    }

    pub async fn ensure_authenticated(&self) -> Result<(), CoreError> {
        self.inner.session.ensure_authenticated().await
    }

    pub fn auth_state(&self) -> AuthState {
        self.inner.session.state()
    }

    pub fn watch_auth_state(&self) -> watch::Receiver<AuthState> {
        self.inner.session.watch_state()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.session.is_authenticated()
    }

    pub fn session(&self) -> Session {
        self.inner.session.session()
    }

    /// Update the TOTP secret for the next MFA step.
    pub fn set_mfa_secret(&self, secret: Option<secrecy::SecretString>) {
        self.inner.session.set_mfa_secret(secret);
    }

    pub fn monitors(&self) -> Vec<Monitor> {
        self.inner.session.session().monitors
    }

    pub fn selected_monitor(&self) -> Option<Monitor> {
        self.inner.session.session().selected_monitor().cloned()
    }

    // ── REST refreshes ───────────────────────────────────────────

    pub async fn refresh_devices(&self) -> Vec<Device> {
        self.inner.poller.refresh_devices().await
    }

    pub async fn refresh_realtime(&self) -> Result<Option<RealtimeSample>, CoreError> {
        self.inner.poller.refresh_realtime().await
    }

    pub async fn refresh_trends(&self) -> Result<TrendSample, CoreError> {
        self.inner.poller.refresh_trends().await
    }

    // ── Realtime stream ──────────────────────────────────────────

    pub async fn open_stream(&self) -> Result<(), CoreError> {
        self.inner.stream.open_stream().await
    }

    pub async fn close_stream(&self) {
        self.inner.stream.close_stream().await;
    }

    pub fn stream_state(&self) -> StreamState {
        self.inner.stream.state()
    }

    pub fn watch_stream_state(&self) -> watch::Receiver<StreamState> {
        self.inner.stream.watch_state()
    }

    // ── Events and snapshots ─────────────────────────────────────

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<SenseEvent>> {
        self.inner.events.subscribe()
    }

    pub fn store(&self) -> &Arc<TelemetryStore> {
        &self.inner.store
    }

    pub fn realtime(&self) -> Option<Arc<RealtimeSample>> {
        self.inner.store.realtime_snapshot()
    }

    pub fn trends(&self) -> Option<Arc<TrendSample>> {
        self.inner.store.trends_snapshot()
    }

    pub fn devices(&self) -> Arc<Vec<Device>> {
        self.inner.store.devices_snapshot()
    }
}

// ── Background tasks ─────────────────────────────────────────────

/// Periodically refresh trends, plus realtime when no stream is running.
async fn polling_task(monitor: SenseMonitor, period: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.tick().await; // consume the immediate first tick

    let poll_realtime = !monitor.inner.config.websocket_enabled;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                if let Err(e) = monitor.refresh_trends().await {
                    debug!(error = %e, "periodic trend refresh failed");
                }
                if poll_realtime {
                    if let Err(e) = monitor.refresh_realtime().await {
                        debug!(error = %e, "periodic realtime refresh failed");
                    }
                }
            }
        }
    }

    debug!("polling task stopped");
}
