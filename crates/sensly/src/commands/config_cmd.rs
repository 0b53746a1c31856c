//! Config subcommand handlers.

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::config;
use crate::error::CliError;
use crate::output;

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_output(&config::config_file(global).display().to_string())
        }

        ConfigCommand::Show => {
            let cfg = config::load(global)?;
            let (name, profile) = config::resolve_profile(global, &cfg)?;
            let text = match global.output {
                OutputFormat::Plain => format!(
                    "# profile: {name}\n{}",
                    sensly_config::render_profile(&profile)?
                ),
                format => output::render(format, &profile.redacted(), |_| String::new())?,
            };
            output::print_output(&text)
        }
    }
}
