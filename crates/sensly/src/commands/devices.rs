//! `sensly devices`: list discovered devices.

use sensly_core::{Device, SenseMonitor};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

pub async fn handle(monitor: &SenseMonitor, global: &GlobalOpts) -> Result<(), CliError> {
    // Surface auth failures here; discovery itself degrades to an empty list.
    monitor.ensure_authenticated().await?;
    let devices = monitor.refresh_devices().await;

    let text = output::render(global.output, &devices, |list| plain(list))?;
    output::print_output(&text)
}

fn plain(devices: &[Device]) -> String {
    if devices.is_empty() {
        return "no devices found".into();
    }
    devices
        .iter()
        .map(|d| match &d.device_type {
            Some(kind) => format!("{:<12} {} ({kind})", d.id, d.name),
            None => format!("{:<12} {}", d.id, d.name),
        })
        .collect::<Vec<_>>()
        .join("\n")
}
