//! `sensly status`: one realtime reading plus usage trends.

use serde::Serialize;

use sensly_core::{RealtimeSample, SenseMonitor, TrendSample};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct Status {
    realtime: Option<RealtimeSample>,
    trends: TrendSample,
}

pub async fn handle(monitor: &SenseMonitor, global: &GlobalOpts) -> Result<(), CliError> {
    let realtime = monitor.refresh_realtime().await?;
    let trends = monitor.refresh_trends().await?;
    let status = Status { realtime, trends };

    let text = output::render(global.output, &status, |s| {
        let realtime = s
            .realtime
            .as_ref()
            .map_or_else(|| "realtime unavailable".into(), output::realtime_line);
        format!("{realtime}\n{}", output::trends_block(&s.trends))
    })?;
    output::print_output(&text)
}
