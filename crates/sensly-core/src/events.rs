// ── Event hub ──
//
// The observable surface of the client. Every component publishes here;
// consumers subscribe and receive `Arc<SenseEvent>` in publish order.
// Delivery to a slow subscriber is lossy once the channel fills (the
// receiver sees `Lagged`), never blocking for the publisher.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::trace;

use crate::error::CoreError;
use crate::model::{RealtimeSample, TrendSample};

const EVENT_CHANNEL_SIZE: usize = 256;

/// Everything the client reports to its consumers.
#[derive(Debug, Clone, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum SenseEvent {
    Authenticated,
    AuthenticationFailed { error: CoreError },
    /// A sample from the realtime stream.
    Data(RealtimeSample),
    /// A sample from the REST status endpoint.
    RealtimeUpdate(RealtimeSample),
    TrendUpdate(TrendSample),
    RealtimeError { error: CoreError },
    TrendError { error: CoreError },
    #[strum(serialize = "websocket_open")]
    WebSocketOpen,
    #[strum(serialize = "websocket_close")]
    WebSocketClose { code: u16, reason: String },
    #[strum(serialize = "websocket_error")]
    WebSocketError { error: CoreError },
}

impl SenseEvent {
    /// Stable snake_case event name.
    pub fn name(&self) -> &'static str {
        self.into()
    }
}

/// Broadcast fan-out for [`SenseEvent`]s.
///
/// Each subscriber sees events in publish order, and a subscriber that
/// keeps up sees every event published after it subscribed. The buffer
/// holds 256 events; a receiver that falls further behind gets
/// [`RecvError::Lagged`](broadcast::error::RecvError::Lagged) with the
/// number of events it missed, then resumes with the oldest retained one.
/// Delivery is therefore at-least-once only for subscribers that drain
/// promptly.
#[derive(Debug, Clone)]
pub struct EventHub {
    tx: broadcast::Sender<Arc<SenseEvent>>,
}

impl EventHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<SenseEvent>> {
        self.tx.subscribe()
    }

    /// Publish to every current subscriber. No subscribers is not an error.
    pub fn emit(&self, event: SenseEvent) {
        trace!(event = event.name(), "emit");
        let _ = self.tx.send(Arc::new(event));
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}
