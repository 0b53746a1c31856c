// sensly-core: Session, polling, and streaming services between sensly-api and consumers.

pub mod cache;
pub mod config;
pub mod convert;
pub mod error;
pub mod events;
pub mod model;
pub mod monitor;
pub mod poller;
pub mod session;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use cache::{AuthCache, CachedAuth};
pub use config::{
    ActiveDeviceRule, ClientConfig, Credentials, DEFAULT_ACTIVE_THRESHOLD_W, DEFAULT_MAX_DEVICES,
    MAX_DEVICES_LIMIT,
};
pub use error::{CoreError, ErrorCategory, MfaFailure};
pub use events::{EventHub, SenseEvent};
pub use monitor::SenseMonitor;
pub use session::{AuthState, SessionManager};
pub use store::TelemetryStore;
pub use stream::StreamState;

pub use model::{ActiveDevice, Device, Monitor, RealtimeSample, Session, TrendSample};

// Transport knobs consumers set on `ClientConfig`.
pub use sensly_api::{ReconnectConfig, TlsMode};

// One-time-password helpers, for the CLI's code preview.
pub use sensly_api::totp;
