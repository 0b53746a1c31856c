// sensly-api: Async Rust client for the Sense REST API and realtime feed

pub mod client;
pub mod error;
pub mod models;
pub mod totp;
pub mod transport;
pub mod websocket;

pub use client::{DEFAULT_API_URL, SenseClient};
pub use error::{Error, MfaFailure};
pub use models::{
    AuthGrant, AuthOutcome, DeviceInfo, MonitorInfo, MonitorStatus, RealtimePayload,
};
pub use transport::{TlsMode, TransportConfig};
pub use websocket::{
    Backoff, DEFAULT_REALTIME_URL, FeedConnection, FeedFrame, ReconnectConfig, realtime_url,
};
