//! Command dispatch: bridges CLI args -> `SenseMonitor` calls -> output.

pub mod auth;
pub mod config_cmd;
pub mod devices;
pub mod status;
pub mod totp;
pub mod watch;

use sensly_core::SenseMonitor;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a monitor-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    monitor: &SenseMonitor,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Auth => auth::handle(monitor, global).await,
        Command::Devices => devices::handle(monitor, global).await,
        Command::Status => status::handle(monitor, global).await,
        Command::Watch(args) => watch::handle(monitor, &args, global).await,
        // Handled before a monitor is built
        Command::Totp(_) | Command::Config(_) | Command::Completions(_) => Ok(()),
    }
}
