// ── Telemetry store ──
//
// Latest replacement snapshots, each held in a `watch` channel so readers
// can either take a snapshot or wait for the next write. Writers always
// replace the whole value; nothing here merges.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::model::{Device, RealtimeSample, TrendSample};

/// Shared by the poller and the streaming client.
pub struct TelemetryStore {
    realtime: watch::Sender<Option<Arc<RealtimeSample>>>,
    trends: watch::Sender<Option<Arc<TrendSample>>>,
    devices: watch::Sender<Arc<Vec<Device>>>,
    last_update: watch::Sender<Option<DateTime<Utc>>>,
}

impl TelemetryStore {
    pub fn new() -> Self {
        Self {
            realtime: watch::channel(None).0,
            trends: watch::channel(None).0,
            devices: watch::channel(Arc::new(Vec::new())).0,
            last_update: watch::channel(None).0,
        }
    }

    // ── Writers ──────────────────────────────────────────────────────

    pub(crate) fn set_realtime(&self, sample: RealtimeSample) {
        self.realtime.send_replace(Some(Arc::new(sample)));
        self.touch();
    }

    pub(crate) fn set_trends(&self, sample: TrendSample) {
        self.trends.send_replace(Some(Arc::new(sample)));
        self.touch();
    }

    pub(crate) fn set_devices(&self, devices: Vec<Device>) {
        self.devices.send_replace(Arc::new(devices));
    }

    fn touch(&self) {
        self.last_update.send_replace(Some(Utc::now()));
    }

    // ── Snapshot accessors ───────────────────────────────────────────

    /// Latest realtime sample from either the REST poller or the stream.
    pub fn realtime_snapshot(&self) -> Option<Arc<RealtimeSample>> {
        self.realtime.borrow().clone()
    }

    pub fn trends_snapshot(&self) -> Option<Arc<TrendSample>> {
        self.trends.borrow().clone()
    }

    pub fn devices_snapshot(&self) -> Arc<Vec<Device>> {
        self.devices.borrow().clone()
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        *self.last_update.borrow()
    }

    // ── Subscriptions ────────────────────────────────────────────────

    pub fn subscribe_realtime(&self) -> watch::Receiver<Option<Arc<RealtimeSample>>> {
        self.realtime.subscribe()
    }

    pub fn subscribe_trends(&self) -> watch::Receiver<Option<Arc<TrendSample>>> {
        self.trends.subscribe()
    }
}

impl Default for TelemetryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample(power_w: f64) -> RealtimeSample {
        RealtimeSample {
            power_w,
            solar_w: 0.0,
            voltage: vec![120.0],
            frequency_hz: 60.0,
            devices: Vec::new(),
        }
    }

    #[test]
    fn writes_replace_previous_sample() {
        let store = TelemetryStore::new();
        assert!(store.realtime_snapshot().is_none());
        assert!(store.last_update().is_none());

        store.set_realtime(sample(100.0));
        store.set_realtime(sample(250.0));

        assert!((store.realtime_snapshot().unwrap().power_w - 250.0).abs() < f64::EPSILON);
        assert!(store.last_update().is_some());
    }

    #[tokio::test]
    async fn subscribers_wake_on_write() {
        let store = TelemetryStore::new();
        let mut rx = store.subscribe_trends();

        store.set_trends(TrendSample {
            daily_usage: 3.5,
            ..TrendSample::default()
        });

        rx.changed().await.unwrap();
        assert!((rx.borrow().as_ref().unwrap().daily_usage - 3.5).abs() < f64::EPSILON);
    }
}
