//! Clap derive structures for the `sensly` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// sensly -- talk to a Sense home energy monitor
#[derive(Debug, Parser)]
#[command(
    name = "sensly",
    version,
    about = "Read power, trend, and device data from a Sense energy monitor",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Account profile to use
    #[arg(long, short = 'p', env = "SENSLY_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "SENSLY_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Account email (overrides profile)
    #[arg(long, short = 'u', env = "SENSLY_USERNAME", global = true)]
    pub username: Option<String>,

    /// Account password (overrides profile)
    #[arg(long, env = "SENSLY_PASSWORD", global = true, hide_env_values = true)]
    pub password: Option<String>,

    /// Base32 TOTP secret for accounts with MFA (overrides profile)
    #[arg(long, env = "SENSLY_MFA_SECRET", global = true, hide_env_values = true)]
    pub mfa_secret: Option<String>,

    /// Monitor id (defaults to the first monitor on the account)
    #[arg(long, short = 'm', env = "SENSLY_MONITOR", global = true)]
    pub monitor: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "SENSLY_OUTPUT",
        default_value = "plain",
        global = true
    )]
    pub output: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "SENSLY_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Plain,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the current TOTP code for a Base32 secret
    Totp(TotpArgs),

    /// Authenticate and show the account and its monitors
    Auth,

    /// Discover the devices Sense has identified
    #[command(alias = "dev")]
    Devices,

    /// Show current power and usage trends
    Status,

    /// Stream live data until interrupted
    Watch(WatchArgs),

    /// Inspect configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct TotpArgs {
    /// Base32-encoded shared secret
    pub secret: String,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Poll realtime data over REST instead of streaming
    #[arg(long)]
    pub no_websocket: bool,

    /// Seconds to wait before retrying a failed start
    #[arg(long, default_value = "120", hide = true)]
    pub retry_secs: u64,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file path
    Path,

    /// Display the active profile (secrets masked)
    Show,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
