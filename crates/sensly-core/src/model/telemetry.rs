// ── Telemetry snapshots ──

use serde::{Deserialize, Serialize};

/// Voltage reported when a payload carries none.
pub const DEFAULT_VOLTAGE: f64 = 120.0;
/// Line frequency reported when a payload carries none.
pub const DEFAULT_FREQUENCY_HZ: f64 = 60.0;

/// A sub-device drawing power in a realtime sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveDevice {
    pub name: String,
    /// Whole watts.
    pub power_w: f64,
}

/// Instantaneous whole-home reading.
///
/// Always a full replacement: a new sample never inherits fields from the
/// previous one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeSample {
    /// Whole watts.
    pub power_w: f64,
    /// Whole watts.
    pub solar_w: f64,
    /// One reading per leg.
    pub voltage: Vec<f64>,
    pub frequency_hz: f64,
    pub devices: Vec<ActiveDevice>,
}

impl RealtimeSample {
    /// Solar production as a share of consumption, in percent.
    pub fn solar_share(&self) -> Option<f64> {
        (self.power_w > 0.0).then(|| self.solar_w / self.power_w * 100.0)
    }
}

/// Aggregate usage totals in kWh, as the service reports them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrendSample {
    pub daily_usage: f64,
    pub daily_production: f64,
    pub weekly_usage: f64,
    pub monthly_usage: f64,
    pub yearly_usage: f64,
}
