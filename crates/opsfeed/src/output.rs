//! Output formatting: table, JSON, YAML, plain.
//!
//! Renders data in the format selected by `--output`. Table uses `tabled`,
//! structured formats use serde, plain emits one identifier per line.

use std::io::{self, IsTerminal, Write};
use std::sync::Arc;

use owo_colors::OwoColorize;
use serde_json::Value;
use tabled::{Table, Tabled, settings::Style};

use opsfeed_core::{Alert, ConnectionState, Severity};

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: &ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

/// Severity label, colored by urgency when enabled.
pub fn severity_label(severity: Severity, color: bool) -> String {
    let label = severity.to_string();
    if !color {
        return label;
    }
    match severity {
        Severity::Info => label.cyan().to_string(),
        Severity::Warning => label.yellow().to_string(),
        Severity::Error => label.red().to_string(),
        Severity::Critical => label.bright_red().bold().to_string(),
    }
}

/// Connection state label, colored when enabled.
pub fn state_label(state: ConnectionState, color: bool) -> String {
    let label = state.to_string().to_lowercase();
    if !color {
        return label;
    }
    match state {
        ConnectionState::Connected => label.green().to_string(),
        ConnectionState::Connecting => label.yellow().to_string(),
        ConnectionState::Disconnected => label.dimmed().to_string(),
        ConnectionState::Errored => label.red().to_string(),
    }
}

// ── Alert rows ───────────────────────────────────────────────────────

#[derive(Tabled)]
pub struct AlertRow {
    #[tabled(rename = "Severity")]
    pub severity: String,
    #[tabled(rename = "Title")]
    pub title: String,
    #[tabled(rename = "Message")]
    pub message: String,
    #[tabled(rename = "Source")]
    pub source: String,
    #[tabled(rename = "Ack")]
    pub acknowledged: String,
    #[tabled(rename = "Expires")]
    pub expires: String,
}

impl AlertRow {
    pub fn from_alert(alert: &Alert, color: bool) -> Self {
        Self {
            severity: severity_label(alert.severity, color),
            title: alert.title.clone(),
            message: alert.message.clone(),
            source: alert.source.clone().unwrap_or_else(|| "-".into()),
            acknowledged: if alert.acknowledged { "yes".into() } else { "-".into() },
            expires: alert
                .expires_at()
                .map_or_else(|| "never".into(), |at| at.format("%H:%M:%S").to_string()),
        }
    }
}

/// Render alerts in the chosen format.
pub fn render_alerts(
    format: &OutputFormat,
    alerts: &[Arc<Alert>],
    color: bool,
) -> Result<String, CliError> {
    render_list(
        format,
        alerts,
        |a| AlertRow::from_alert(a, color),
        |a| a.id.to_string(),
    )
}

// ── Live updates ─────────────────────────────────────────────────────

/// Render one inbound payload. Table mode prints compact JSON behind a
/// timestamp, since payloads have no fixed shape.
pub fn render_update(format: &OutputFormat, payload: &Value) -> Result<String, CliError> {
    match format {
        OutputFormat::Table | OutputFormat::Plain => {
            let now = chrono::Local::now().format("%H:%M:%S%.3f");
            Ok(format!("{now}  {}", render_json_compact(payload)?))
        }
        OutputFormat::Json | OutputFormat::JsonCompact => render_json_compact(payload),
        OutputFormat::Yaml => Ok(format!("---\n{}", render_yaml(payload)?)),
    }
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a list of serde-serializable + tabled items in the chosen format.
///
/// - `table`: uses the `Tabled` derive to build a pretty table
/// - `json` / `json-compact`: serializes the original data via serde
/// - `yaml`: serializes via serde_yaml
/// - `plain`: calls `id_fn` on each item to emit one identifier per line
pub fn render_list<T, R>(
    format: &OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
    id_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize,
    R: Tabled,
{
    match format {
        OutputFormat::Table => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            Ok(render_table(&rows))
        }
        OutputFormat::Json => render_json_pretty(data),
        OutputFormat::JsonCompact => render_json_compact(data),
        OutputFormat::Yaml => render_yaml(data),
        OutputFormat::Plain => Ok(data.iter().map(&id_fn).collect::<Vec<_>>().join("\n")),
    }
}

/// Render a single serde-serializable item in the chosen format.
///
/// Table rendering uses a custom `detail_fn` that returns a pre-formatted string.
pub fn render_single<T>(
    format: &OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
    id_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize,
{
    match format {
        OutputFormat::Table => Ok(detail_fn(data)),
        OutputFormat::Json => render_json_pretty(data),
        OutputFormat::JsonCompact => render_json_compact(data),
        OutputFormat::Yaml => render_yaml(data),
        OutputFormat::Plain => Ok(id_fn(data)),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Format-specific renderers ────────────────────────────────────────

fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

/// Pretty-printed JSON.
pub(crate) fn render_json_pretty<T: serde::Serialize + ?Sized>(data: &T) -> Result<String, CliError> {
    serde_json::to_string_pretty(data).map_err(|e| CliError::Render(e.to_string()))
}

/// Compact single-line JSON.
pub(crate) fn render_json_compact<T: serde::Serialize + ?Sized>(data: &T) -> Result<String, CliError> {
    serde_json::to_string(data).map_err(|e| CliError::Render(e.to_string()))
}

/// YAML output.
pub(crate) fn render_yaml<T: serde::Serialize + ?Sized>(data: &T) -> Result<String, CliError> {
    serde_yaml::to_string(data).map_err(|e| CliError::Render(e.to_string()))
}
