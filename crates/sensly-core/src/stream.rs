// ── Realtime streaming client ──
//
// Keeps one realtime feed connection alive for the selected monitor.
// A single background task owns the connection, the backoff schedule,
// and the reconnect timer, so a close during a pending reconnect can
// never schedule a second one.

use std::sync::Arc;
use std::time::Duration;

use secrecy::ExposeSecret;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use url::Url;

use sensly_api::{Backoff, FeedConnection, FeedFrame, ReconnectConfig, realtime_url};

use crate::config::{ActiveDeviceRule, ClientConfig, MAX_DEVICES_LIMIT};
use crate::convert::realtime_sample;
use crate::error::CoreError;
use crate::events::{EventHub, SenseEvent};
use crate::session::SessionManager;
use crate::store::TelemetryStore;

// ── StreamState ──────────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamState {
    Closed,
    Connecting,
    Open,
    /// Waiting `delay` before the next connect attempt.
    Reconnecting { delay: Duration },
}

// ── StreamClient ─────────────────────────────────────────────────

/// Owner of the realtime feed task.
#[derive(Clone)]
pub struct StreamClient {
    inner: Arc<StreamInner>,
}

struct StreamInner {
    session: Arc<SessionManager>,
    store: Arc<TelemetryStore>,
    events: EventHub,
    base_url: Url,
    reconnect: ReconnectConfig,
    rule: ActiveDeviceRule,
    max_devices: usize,
    state: watch::Sender<StreamState>,
    running: Mutex<Option<RunningStream>>,
}

struct RunningStream {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// How one connection cycle ended.
enum Cycle {
    Ended,
    Cancelled,
}

impl StreamClient {
    pub fn new(
        session: Arc<SessionManager>,
        store: Arc<TelemetryStore>,
        events: EventHub,
        config: &ClientConfig,
    ) -> Self {
        let (state, _) = watch::channel(StreamState::Closed);
        Self {
            inner: Arc::new(StreamInner {
                session,
                store,
                events,
                base_url: config.realtime_url.clone(),
                reconnect: config.reconnect.clone(),
                rule: config.active_device_rule,
                max_devices: config.max_devices.min(MAX_DEVICES_LIMIT),
                state,
                running: Mutex::new(None),
            }),
        }
    }

    pub fn state(&self) -> StreamState {
        self.inner.state.borrow().clone()
    }

    pub fn watch_state(&self) -> watch::Receiver<StreamState> {
        self.inner.state.subscribe()
    }

    /// Start the feed task.
    ///
    /// Rejected with [`CoreError::NotAuthenticated`] unless the session is
    /// authenticated; the rejection is not retried. Opening a stream that
    /// is already running is a no-op.
    pub async fn open_stream(&self) -> Result<(), CoreError> {
        let mut running = self.inner.running.lock().await;
        if running.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            debug!("realtime stream already running");
            return Ok(());
        }

        if !self.inner.session.is_authenticated() {
            error!("cannot open realtime stream: not authenticated");
            return Err(CoreError::NotAuthenticated);
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(stream_task(Arc::clone(&self.inner), cancel.clone()));
        *running = Some(RunningStream { cancel, handle });
        Ok(())
    }

    /// Cancel any pending reconnect, close the transport, and wait for the
    /// task to exit.
    pub async fn close_stream(&self) {
        let running = self.inner.running.lock().await.take();
        if let Some(RunningStream { cancel, handle }) = running {
            cancel.cancel();
            let _ = handle.await;
            info!("realtime stream closed");
        }
        self.inner.state.send_replace(StreamState::Closed);
    }
}

// ── Background task ──────────────────────────────────────────────

async fn stream_task(inner: Arc<StreamInner>, cancel: CancellationToken) {
    let mut backoff = Backoff::new(inner.reconnect.clone());

    loop {
        if let Cycle::Cancelled = run_connection(&inner, &cancel, &mut backoff).await {
            break;
        }

        let delay = backoff.next_delay();
        inner
            .state
            .send_replace(StreamState::Reconnecting { delay });
        info!(delay_secs = delay.as_secs(), "realtime stream reconnecting");

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }
    }

    debug!("realtime stream task exiting");
}

/// One connect-and-read cycle.
async fn run_connection(
    inner: &StreamInner,
    cancel: &CancellationToken,
    backoff: &mut Backoff,
) -> Cycle {
    inner.state.send_replace(StreamState::Connecting);

    let (url, generation) = match connect_url(inner).await {
        Ok(target) => target,
        Err(e) => {
            report_failure(inner, e, None);
            return Cycle::Ended;
        }
    };

    let opened = tokio::select! {
        biased;
        () = cancel.cancelled() => return Cycle::Cancelled,
        result = FeedConnection::open(&url) => result,
    };
    let mut conn = match opened {
        Ok(conn) => conn,
        Err(e) => {
            report_failure(inner, e.into(), Some(generation));
            return Cycle::Ended;
        }
    };

    inner.state.send_replace(StreamState::Open);
    backoff.reset();
    info!("realtime stream open");
    inner.events.emit(SenseEvent::WebSocketOpen);

    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            frame = conn.next_frame() => Some(frame),
        };
        let Some(frame) = next else {
            conn.close().await;
            return Cycle::Cancelled;
        };

        match frame {
            FeedFrame::Payload(payload) => {
                let sample = realtime_sample(&payload, inner.rule, inner.max_devices);
                trace!(power_w = sample.power_w, "realtime sample");
                inner.store.set_realtime(sample.clone());
                inner.events.emit(SenseEvent::Data(sample));
            }
            FeedFrame::Ignored { kind } => {
                trace!(?kind, "realtime frame without payload");
            }
            FeedFrame::Malformed(reason) => {
                debug!(%reason, "dropping malformed realtime frame");
            }
            FeedFrame::Closed { code, reason } => {
                info!(code, %reason, "realtime stream closed by server");
                inner
                    .events
                    .emit(SenseEvent::WebSocketClose { code, reason });
                return Cycle::Ended;
            }
            FeedFrame::Failed(e) => {
                report_failure(inner, e.into(), Some(generation));
                return Cycle::Ended;
            }
        }
    }
}

/// Refresh the session if needed and build the feed URL from its token,
/// along with the token's generation.
async fn connect_url(inner: &StreamInner) -> Result<(Url, u64), CoreError> {
    inner.session.ensure_authenticated().await?;

    let generation = inner.session.generation();
    let monitor_id = inner.session.monitor_id().ok_or(CoreError::NoMonitor)?;
    let token = inner
        .session
        .access_token()
        .ok_or(CoreError::NotAuthenticated)?;

    let url = realtime_url(&inner.base_url, &monitor_id, token.expose_secret())?;
    Ok((url, generation))
}

/// `generation` is the token the failed connection used, if it got one.
fn report_failure(inner: &StreamInner, error: CoreError, generation: Option<u64>) {
    warn!(error = %error, "realtime stream error");
    if let Some(generation) = generation.filter(|_| error.is_auth_expired()) {
        inner.session.invalidate(generation);
    }
    inner.events.emit(SenseEvent::WebSocketError { error });
}
