// ── API-to-domain conversions ──
//
// Bridges raw `sensly_api` wire types into `sensly_core::model` types.
// Realtime normalization lives here: missing fields get their defaults,
// power values are rounded to whole watts, and the sub-device list is
// filtered and capped.

use serde_json::Value;

use sensly_api::{DeviceInfo, MonitorInfo, MonitorStatus, RealtimePayload};

use crate::config::ActiveDeviceRule;
use crate::model::telemetry::{DEFAULT_FREQUENCY_HZ, DEFAULT_VOLTAGE};
use crate::model::{ActiveDevice, Device, Monitor, RealtimeSample, TrendSample};

// ── Monitor / device ───────────────────────────────────────────────

impl From<MonitorInfo> for Monitor {
    fn from(info: MonitorInfo) -> Self {
        let name = info.display_name().to_owned();
        Monitor { id: info.id, name }
    }
}

impl From<DeviceInfo> for Device {
    fn from(info: DeviceInfo) -> Self {
        Device {
            id: info.id,
            name: info.name,
            device_type: info.device_type,
        }
    }
}

// ── Realtime ───────────────────────────────────────────────────────

/// Treat `0` like an absent value, as the service does for `w`/`hz`.
fn non_zero(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v != 0.0)
}

/// Normalize a realtime payload into a replacement sample.
///
/// `power_w` prefers `w` and falls back to `d_w`. Voltage defaults to
/// `[120]` and frequency to `60`. At most `max_devices` active
/// sub-devices are kept, in payload order.
pub fn realtime_sample(
    payload: &RealtimePayload,
    rule: ActiveDeviceRule,
    max_devices: usize,
) -> RealtimeSample {
    let power = non_zero(payload.w).or(payload.d_w).unwrap_or(0.0);

    RealtimeSample {
        power_w: power.round(),
        solar_w: payload.solar_w.unwrap_or(0.0).round(),
        voltage: payload
            .voltage
            .clone()
            .unwrap_or_else(|| vec![DEFAULT_VOLTAGE]),
        frequency_hz: non_zero(payload.hz).unwrap_or(DEFAULT_FREQUENCY_HZ),
        devices: active_devices(payload.devices.as_ref(), rule, max_devices),
    }
}

/// Structurally validate and filter the raw sub-device array.
///
/// Entries that are not objects, lack a non-empty `name`, or lack a
/// numeric `w` are dropped before the rule is applied.
pub fn active_devices(
    raw: Option<&Value>,
    rule: ActiveDeviceRule,
    max_devices: usize,
) -> Vec<ActiveDevice> {
    let Some(Value::Array(entries)) = raw else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            let name = entry.get("name")?.as_str().filter(|n| !n.is_empty())?;
            let power = entry.get("w")?.as_f64()?;
            let active = match rule {
                ActiveDeviceRule::PowerAbove { threshold_w } => power > threshold_w,
                ActiveDeviceRule::StateActive => {
                    entry.get("state").and_then(Value::as_str) == Some("active")
                }
            };
            active.then(|| ActiveDevice {
                name: name.to_owned(),
                power_w: power.round(),
            })
        })
        .take(max_devices)
        .collect()
}

// ── Trends ─────────────────────────────────────────────────────────

impl From<&MonitorStatus> for TrendSample {
    fn from(status: &MonitorStatus) -> Self {
        TrendSample {
            daily_usage: status.daily_usage.unwrap_or(0.0),
            daily_production: status.daily_production.unwrap_or(0.0),
            weekly_usage: status.weekly_usage.unwrap_or(0.0),
            monthly_usage: status.monthly_usage.unwrap_or(0.0),
            yearly_usage: status.yearly_usage.unwrap_or(0.0),
        }
    }
}
