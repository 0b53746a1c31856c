// ── REST poller ──
//
// Request/response refreshes against the status and device endpoints.
// Every call first makes sure the session is fresh. A refused token
// invalidates the session it was issued to, re-authenticates once, and
// retries once.
// Failures emit an error event and leave the stored snapshots alone.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use sensly_api::{DeviceInfo, MonitorStatus, SenseClient};

use crate::config::{ActiveDeviceRule, ClientConfig, MAX_DEVICES_LIMIT};
use crate::convert::realtime_sample;
use crate::error::CoreError;
use crate::events::{EventHub, SenseEvent};
use crate::model::{Device, RealtimeSample, TrendSample};
use crate::session::SessionManager;
use crate::store::TelemetryStore;

/// Rate-limited REST refreshes for one monitor.
pub struct Poller {
    client: Arc<SenseClient>,
    session: Arc<SessionManager>,
    store: Arc<TelemetryStore>,
    events: EventHub,
    rule: ActiveDeviceRule,
    max_devices: usize,
    rate_limit: Duration,
    /// Start time of the last successful realtime call. Held for the
    /// whole call so overlapping refreshes serialize.
    last_realtime: Mutex<Option<Instant>>,
}

impl Poller {
    pub fn new(
        client: Arc<SenseClient>,
        session: Arc<SessionManager>,
        store: Arc<TelemetryStore>,
        events: EventHub,
        config: &ClientConfig,
    ) -> Self {
        Self {
            client,
            session,
            store,
            events,
            rule: config.active_device_rule,
            max_devices: config.max_devices.min(MAX_DEVICES_LIMIT),
            rate_limit: config.realtime_rate_limit,
            last_realtime: Mutex::new(None),
        }
    }

    // ── Devices ──────────────────────────────────────────────────

    /// Discover sub-devices, replacing the stored list.
    ///
    /// Tries the primary endpoint, then the alternate one. A failure on
    /// both yields (and stores) an empty list; discovery never errors.
    pub async fn refresh_devices(&self) -> Vec<Device> {
        let devices = match self.discover().await {
            Ok(raw) => {
                info!(count = raw.len(), "retrieved devices");
                raw.into_iter().map(Device::from).collect()
            }
            Err(e) => {
                warn!(error = %e, "device discovery failed");
                Vec::new()
            }
        };
        self.store.set_devices(devices.clone());
        devices
    }

    async fn discover(&self) -> Result<Vec<DeviceInfo>, CoreError> {
        self.session.ensure_authenticated().await?;
        let monitor_id = self.monitor_id()?;
        let generation = self.session.generation();

        match self.client.devices(&monitor_id).await {
            Ok(devices) => Ok(devices),
            Err(e) => {
                debug!(error = %e, "primary devices endpoint failed, trying alternate");
                if e.is_auth_expired() {
                    self.reauthenticate(generation).await?;
                }
                Ok(self.client.devices_alternate(&monitor_id).await?)
            }
        }
    }

    // ── Realtime ─────────────────────────────────────────────────

    /// Fetch a realtime snapshot over REST.
    ///
    /// Returns `Ok(None)` without any network call when the previous
    /// successful call is younger than the rate limit.
    pub async fn refresh_realtime(&self) -> Result<Option<RealtimeSample>, CoreError> {
        let result = self.fetch_realtime().await;
        match &result {
            Ok(Some(sample)) => {
                self.store.set_realtime(sample.clone());
                self.events.emit(SenseEvent::RealtimeUpdate(sample.clone()));
            }
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "realtime refresh failed");
                self.events
                    .emit(SenseEvent::RealtimeError { error: e.clone() });
            }
        }
        result
    }

    async fn fetch_realtime(&self) -> Result<Option<RealtimeSample>, CoreError> {
        self.session.ensure_authenticated().await?;

        let mut last = self.last_realtime.lock().await;
        let now = Instant::now();
        if last.is_some_and(|prev| now.duration_since(prev) < self.rate_limit) {
            debug!("rate limited, skipping realtime refresh");
            return Ok(None);
        }

        let status = self.status().await?;
        *last = Some(now);
        Ok(Some(realtime_sample(
            &status.realtime,
            self.rule,
            self.max_devices,
        )))
    }

    // ── Trends ───────────────────────────────────────────────────

    /// Fetch the aggregate usage totals.
    pub async fn refresh_trends(&self) -> Result<TrendSample, CoreError> {
        let result = async {
            self.session.ensure_authenticated().await?;
            let status = self.status().await?;
            Ok::<_, CoreError>(TrendSample::from(&status))
        }
        .await;

        match &result {
            Ok(sample) => {
                self.store.set_trends(sample.clone());
                self.events.emit(SenseEvent::TrendUpdate(sample.clone()));
            }
            Err(e) => {
                warn!(error = %e, "trend refresh failed");
                self.events.emit(SenseEvent::TrendError { error: e.clone() });
            }
        }
        result
    }

    // ── Helpers ──────────────────────────────────────────────────

    async fn status(&self) -> Result<MonitorStatus, CoreError> {
        let monitor_id = self.monitor_id()?;
        let generation = self.session.generation();
        match self.client.monitor_status(&monitor_id).await {
            Err(e) if e.is_auth_expired() => {
                self.reauthenticate(generation).await?;
                Ok(self.client.monitor_status(&monitor_id).await?)
            }
            other => Ok(other?),
        }
    }

    async fn reauthenticate(&self, generation: u64) -> Result<(), CoreError> {
        info!("token refused, re-authenticating");
        self.session.invalidate(generation);
        self.session.ensure_authenticated().await
    }

    fn monitor_id(&self) -> Result<String, CoreError> {
        self.session.monitor_id().ok_or(CoreError::NoMonitor)
    }
}
