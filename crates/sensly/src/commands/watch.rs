//! `sensly watch`: start the monitor and print every event until Ctrl-C.
//!
//! A failed start (bad credentials, MFA trouble, service down) is retried
//! after a fixed delay rather than exiting, so a long-running watch
//! survives outages.

use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

use sensly_core::{SenseEvent, SenseMonitor};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

pub async fn handle(
    monitor: &SenseMonitor,
    args: &WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let mut events = monitor.subscribe();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let retry = Duration::from_secs(args.retry_secs);
    while let Err(e) = monitor.start().await {
        error!(error = %e, retry_secs = retry.as_secs(), "failed to start monitor");
        if let Some(hint) = e.hint() {
            warn!("{hint}");
        }
        tokio::select! {
            () = tokio::time::sleep(retry) => info!("retrying initialization"),
            _ = &mut shutdown => {
                monitor.shutdown().await;
                return Ok(());
            }
        }
    }

    info!("watching for events, Ctrl-C to stop");
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            recv = events.recv() => match recv {
                Ok(event) => output::print_output(&render_event(&event, global.output)?)?,
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "output fell behind, events dropped"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    monitor.shutdown().await;
    Ok(())
}

fn render_event(event: &SenseEvent, format: OutputFormat) -> Result<String, CliError> {
    let name = event.name();
    let value = match event {
        SenseEvent::Data(sample) | SenseEvent::RealtimeUpdate(sample) => {
            json!({ "event": name, "sample": sample })
        }
        SenseEvent::TrendUpdate(trends) => json!({ "event": name, "trends": trends }),
        SenseEvent::WebSocketClose { code, reason } => {
            json!({ "event": name, "code": code, "reason": reason })
        }
        SenseEvent::AuthenticationFailed { error }
        | SenseEvent::RealtimeError { error }
        | SenseEvent::TrendError { error }
        | SenseEvent::WebSocketError { error } => json!({
            "event": name,
            "category": error.category().to_string(),
            "error": error.to_string(),
        }),
        SenseEvent::Authenticated | SenseEvent::WebSocketOpen => json!({ "event": name }),
    };

    output::render(format, &value, |_| plain(event))
}

fn plain(event: &SenseEvent) -> String {
    let detail = match event {
        SenseEvent::Data(sample) | SenseEvent::RealtimeUpdate(sample) => {
            output::realtime_line(sample)
        }
        SenseEvent::TrendUpdate(trends) => format!(
            "today {:.2} kWh  month {:.2} kWh",
            trends.daily_usage, trends.monthly_usage
        ),
        SenseEvent::WebSocketClose { code, reason } => format!("code {code} {reason}"),
        SenseEvent::AuthenticationFailed { error }
        | SenseEvent::RealtimeError { error }
        | SenseEvent::TrendError { error }
        | SenseEvent::WebSocketError { error } => error.to_string(),
        SenseEvent::Authenticated | SenseEvent::WebSocketOpen => String::new(),
    };
    format!(
        "{} {:<21} {detail}",
        Utc::now().format("%H:%M:%S"),
        event.name()
    )
    .trim_end()
    .to_owned()
}
