//! Clap derive structures for the `opsfeed` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// opsfeed -- live dashboard feed client
#[derive(Debug, Parser)]
#[command(
    name = "opsfeed",
    version,
    about = "Watch live dashboard topics and raise alerts from the command line",
    long_about = "Connects to a dashboard backend over a single WebSocket, subscribes\n\
        to topics, prints every update, and turns configured threshold rules\n\
        into alerts. Reconnects automatically when the server goes away.",
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
    /// WebSocket endpoint (overrides config)
    #[arg(long, short = 'e', env = "OPSFEED_ENDPOINT", global = true)]
    pub endpoint: Option<String>,

    /// Config file path (default: platform config dir)
    #[arg(long, env = "OPSFEED_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "OPSFEED_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

/// Alert severity as accepted on the command line.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SeverityArg {
    Info,
    Warning,
    Error,
    Critical,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Subscribe to topics and print live updates
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Send one raw JSON frame to the server
    Send(SendArgs),

    /// Work with the local alert queue
    #[command(alias = "a")]
    Alerts(AlertsArgs),

    /// Manage CLI configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Watch ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Topic to subscribe to (repeatable; adds to configured topics)
    #[arg(long = "topic", short = 't')]
    pub topics: Vec<String>,

    /// Don't evaluate threshold rules
    #[arg(long)]
    pub no_rules: bool,

    /// Exit after this many updates
    #[arg(long, short = 'n')]
    pub count: Option<usize>,

    /// Exit after this long (e.g. "30s", "5m")
    #[arg(long, value_parser = humantime::parse_duration)]
    pub duration: Option<Duration>,
}

// ── Send ─────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SendArgs {
    /// JSON payload, sent as-is
    pub json: String,

    /// How long to wait for the connection (e.g. "10s")
    #[arg(long, default_value = "10s", value_parser = humantime::parse_duration)]
    pub wait: Duration,
}

// ── Alerts ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct AlertsArgs {
    #[command(subcommand)]
    pub command: AlertsCommand,
}

#[derive(Debug, Subcommand)]
pub enum AlertsCommand {
    /// Raise sample alerts and show how the queue treats them
    Demo {
        /// Number of alerts per severity
        #[arg(long, short = 'n', default_value = "1")]
        count: usize,

        /// Queue capacity (overrides config)
        #[arg(long)]
        max_alerts: Option<usize>,

        /// Wait this long, then show the queue again (e.g. "6s")
        #[arg(long, value_parser = humantime::parse_duration)]
        wait: Option<Duration>,
    },

    /// Evaluate configured rules against a JSON payload
    Check {
        /// JSON payload to evaluate
        json: String,
    },

    /// Raise a single alert and print it
    Raise {
        /// Alert message
        message: String,

        #[arg(long, short = 's', value_enum, default_value = "info")]
        severity: SeverityArg,

        /// Alert title (default: severity name)
        #[arg(long)]
        title: Option<String>,

        /// Source tag
        #[arg(long)]
        source: Option<String>,
    },
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file path
    Path,

    /// Display current resolved configuration
    Show,

    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
