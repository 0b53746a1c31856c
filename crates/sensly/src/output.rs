//! Output formatting: plain text or JSON.

use std::io::{self, Write};

use serde::Serialize;

use sensly_core::{ActiveDevice, RealtimeSample, TrendSample};

use crate::cli::OutputFormat;
use crate::error::CliError;

/// Render `data` as JSON, or through `plain` for human-readable output.
pub fn render<T: Serialize>(
    format: OutputFormat,
    data: &T,
    plain: impl FnOnce(&T) -> String,
) -> Result<String, CliError> {
    Ok(match format {
        OutputFormat::Plain => plain(data),
        OutputFormat::Json => serde_json::to_string_pretty(data)?,
        OutputFormat::JsonCompact => serde_json::to_string(data)?,
    })
}

/// Write a rendered block to stdout, skipping empty output.
pub fn print_output(text: &str) -> Result<(), CliError> {
    if text.is_empty() {
        return Ok(());
    }
    let mut out = io::stdout().lock();
    writeln!(out, "{text}")?;
    out.flush()?;
    Ok(())
}

// ── Plain renderers ─────────────────────────────────────────────────

pub fn realtime_line(sample: &RealtimeSample) -> String {
    let volts = sample
        .voltage
        .iter()
        .map(|v| format!("{v:.1}"))
        .collect::<Vec<_>>()
        .join("/");
    let mut line = format!(
        "power {:.0} W  solar {:.0} W  voltage {volts} V  {:.1} Hz",
        sample.power_w, sample.solar_w, sample.frequency_hz
    );
    if !sample.devices.is_empty() {
        line.push_str("  active: ");
        line.push_str(&devices_inline(&sample.devices));
    }
    line
}

fn devices_inline(devices: &[ActiveDevice]) -> String {
    devices
        .iter()
        .map(|d| format!("{} {:.0} W", d.name, d.power_w))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn trends_block(trends: &TrendSample) -> String {
    format!(
        "today      {:>10.2} kWh used  {:.2} kWh produced\n\
         this week  {:>10.2} kWh\n\
         this month {:>10.2} kWh\n\
         this year  {:>10.2} kWh",
        trends.daily_usage,
        trends.daily_production,
        trends.weekly_usage,
        trends.monthly_usage,
        trends.yearly_usage
    )
}
