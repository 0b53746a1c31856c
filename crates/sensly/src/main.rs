mod cli;
mod commands;
mod config;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use sensly_core::SenseMonitor;

use crate::cli::{Cli, Command};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli).await {
        let exit = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(exit);
    }
}

/// `-v` count to a default filter; `RUST_LOG` takes precedence.
fn init_tracing(verbosity: u8) {
    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    // Logs go to stderr so JSON output on stdout stays parseable.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Local commands don't need an account
        Command::Totp(ref args) => commands::totp::handle(args, &cli.global),
        Command::Config(ref args) => commands::config_cmd::handle(args, &cli.global),

        Command::Completions(ref args) => {
            clap_complete::generate(
                args.shell,
                &mut <Cli as clap::CommandFactory>::command(),
                "sensly",
                &mut std::io::stdout(),
            );
            Ok(())
        }

        // Everything else talks to the Sense service
        cmd => {
            let (profile, mut client_config) = config::build_client_config(&cli.global)?;
            if matches!(cmd, Command::Watch(ref args) if args.no_websocket) {
                client_config.websocket_enabled = false;
            }
            let monitor = SenseMonitor::new(client_config)?;

            tracing::debug!(command = ?cmd, profile = %profile, "dispatching command");
            commands::dispatch(cmd, &monitor, &cli.global)
                .await
                .map_err(|e| e.with_profile(&profile))
        }
    }
}
