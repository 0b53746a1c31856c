//! `sensly auth`: authenticate and describe the session.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::Serialize;

use sensly_core::{Monitor, SenseMonitor};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct AuthSummary {
    user_id: Option<String>,
    account_id: Option<String>,
    monitor_id: Option<String>,
    monitors: Vec<Monitor>,
    authenticated_at: Option<DateTime<Utc>>,
}

pub async fn handle(monitor: &SenseMonitor, global: &GlobalOpts) -> Result<(), CliError> {
    monitor.authenticate().await?;

    let session = monitor.session();
    let summary = AuthSummary {
        user_id: session.user_id,
        account_id: session.account_id,
        monitor_id: session.monitor_id,
        monitors: session.monitors,
        authenticated_at: session.last_auth_time,
    };

    let text = output::render(global.output, &summary, plain)?;
    output::print_output(&text)
}

fn plain(summary: &AuthSummary) -> String {
    let mut out = String::from("authenticated\n");
    let _ = writeln!(out, "user     {}", summary.user_id.as_deref().unwrap_or("-"));
    let _ = writeln!(out, "account  {}", summary.account_id.as_deref().unwrap_or("-"));
    out.push_str("monitors");
    if summary.monitors.is_empty() {
        out.push_str(" (none)");
    }
    for m in &summary.monitors {
        let marker = if summary.monitor_id.as_deref() == Some(m.id.as_str()) {
            '*'
        } else {
            ' '
        };
        let _ = write!(out, "\n  {marker} {}  {}", m.id, m.name);
    }
    out
}
