//! Realtime feed transport.
//!
//! A [`FeedConnection`] is one WebSocket session against the Sense
//! realtime endpoint. It hands back classified [`FeedFrame`]s and never
//! reconnects on its own; the reconnect policy lives in [`Backoff`] and is
//! driven by the caller (`sensly-core`'s streaming client), which needs to
//! re-check authentication between attempts.
//!
//! # Example
//!
//! ```rust,ignore
//! use sensly_api::websocket::{FeedConnection, FeedFrame, realtime_url};
//!
//! let url = realtime_url(&base, "12345", token)?;
//! let mut conn = FeedConnection::open(&url).await?;
//! while let FeedFrame::Payload(p) = conn.next_frame().await {
//!     println!("{:?} W", p.w);
//! }
//! ```

use std::time::Duration;

use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, protocol::frame::coding::CloseCode};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::error::Error;
use crate::models::{FeedMessage, RealtimePayload};

/// Default realtime feed base URL. The monitor id is appended.
pub const DEFAULT_REALTIME_URL: &str = "wss://clientrt.sense.com/monitors/";

/// Close code reported when the stream ends without a close frame.
const ABNORMAL_CLOSE: u16 = 1006;

/// How long [`FeedConnection::close`] waits for the peer's close frame.
const CLOSE_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Build `{base}{monitor_id}/realtimefeed?access_token=...`.
pub fn realtime_url(base: &Url, monitor_id: &str, access_token: &str) -> Result<Url, Error> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    let mut url = base.join(&format!("{monitor_id}/realtimefeed"))?;
    url.query_pairs_mut()
        .append_pair("access_token", access_token);
    Ok(url)
}

// ── ReconnectConfig / Backoff ────────────────────────────────────────

/// Exponential backoff configuration for feed reconnection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 30s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 5 minutes.
    pub max_delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(30),
            max_delay: Duration::from_secs(300),
        }
    }
}

/// Reconnect delay tracker.
///
/// [`next_delay`](Self::next_delay) hands out the current delay and doubles
/// it for the following cycle, clamped at `max_delay`.
/// [`reset`](Self::reset) drops back to the floor after a successful open.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: ReconnectConfig,
    current: Duration,
}

impl Backoff {
    pub fn new(config: ReconnectConfig) -> Self {
        let current = config.initial_delay;
        Self { config, current }
    }

    /// The delay the next reconnect will wait, without advancing.
    pub fn peek(&self) -> Duration {
        self.current
    }

    /// Take the current delay and advance the schedule.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self
            .current
            .saturating_mul(2)
            .min(self.config.max_delay);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.config.initial_delay;
    }
}

// ── Frames ───────────────────────────────────────────────────────────

/// One classified event from the feed.
#[derive(Debug)]
pub enum FeedFrame {
    /// A frame carrying a telemetry payload.
    Payload(RealtimePayload),
    /// Valid JSON without a payload (hello, keepalive, monitor info).
    Ignored { kind: Option<String> },
    /// Text that is not a valid feed frame. The connection stays up.
    Malformed(String),
    /// The server closed the connection or the stream ended.
    Closed { code: u16, reason: String },
    /// Transport failure mid-stream.
    Failed(Error),
}

/// Classify a text frame.
pub fn parse_frame(text: &str) -> FeedFrame {
    match serde_json::from_str::<FeedMessage>(text) {
        Ok(FeedMessage {
            payload: Some(payload),
            ..
        }) => FeedFrame::Payload(payload),
        Ok(FeedMessage { kind, .. }) => FeedFrame::Ignored { kind },
        Err(e) => FeedFrame::Malformed(e.to_string()),
    }
}

// ── FeedConnection ───────────────────────────────────────────────────

/// One open realtime feed connection.
pub struct FeedConnection {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl FeedConnection {
    /// Perform the WebSocket handshake.
    ///
    /// A 401 on the upgrade maps to [`Error::SessionExpired`] so the caller
    /// can re-authenticate before the next attempt.
    pub async fn open(url: &Url) -> Result<Self, Error> {
        // The query string carries the access token; log the path only.
        tracing::info!(path = url.path(), "Connecting to realtime feed");

        let (ws, _response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| match e {
                tungstenite::Error::Http(ref resp) if resp.status().as_u16() == 401 => {
                    Error::SessionExpired
                }
                other => Error::WebSocketConnect(other.to_string()),
            })?;

        tracing::info!("Realtime feed connected");
        Ok(Self { ws })
    }

    /// Wait for the next meaningful frame.
    ///
    /// Pings, pongs, and binary frames are skipped; tungstenite answers
    /// pings on its own.
    pub async fn next_frame(&mut self) -> FeedFrame {
        loop {
            match self.ws.next().await {
                Some(Ok(tungstenite::Message::Text(text))) => return parse_frame(text.as_str()),
                Some(Ok(tungstenite::Message::Close(frame))) => {
                    let (code, reason) = frame.map_or_else(
                        || (u16::from(CloseCode::Status), String::new()),
                        |cf| (u16::from(cf.code), cf.reason.to_string()),
                    );
                    tracing::info!(code, reason = %reason, "Realtime feed close frame received");
                    return FeedFrame::Closed { code, reason };
                }
                Some(Ok(_)) => {
                    tracing::trace!("Realtime feed control frame");
                }
                Some(Err(e)) => return FeedFrame::Failed(Error::WebSocketConnect(e.to_string())),
                None => {
                    tracing::info!("Realtime feed stream ended");
                    return FeedFrame::Closed {
                        code: ABNORMAL_CLOSE,
                        reason: "stream ended".into(),
                    };
                }
            }
        }
    }

    /// Send a close frame and drain until the peer acknowledges, giving
    /// up after [`CLOSE_DRAIN_TIMEOUT`].
    pub async fn close(mut self) {
        if let Err(e) = self.ws.close(None).await {
            tracing::debug!(error = %e, "Realtime feed close failed");
            return;
        }

        let drain = async { while let Some(Ok(_)) = self.ws.next().await {} };
        if tokio::time::timeout(CLOSE_DRAIN_TIMEOUT, drain).await.is_err() {
            tracing::debug!("Realtime feed close not acknowledged, dropping");
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
