//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use opsfeed_config::ConfigError;
use opsfeed_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONFIG: i32 = 3;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to {url}")]
    #[diagnostic(
        code(opsfeed::connection_failed),
        help(
            "Check that the server is running and accepts WebSocket connections.\n\
             URL: {url}\n\
             Override with: opsfeed --endpoint ws://host:port/path ..."
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Timed out after {seconds}s waiting for {what}")]
    #[diagnostic(
        code(opsfeed::timeout),
        help("Increase the wait with --wait, or check that the server is reachable.")
    )]
    Timeout { what: String, seconds: u64 },

    #[error("Connection manager was shut down")]
    #[diagnostic(code(opsfeed::shut_down))]
    ShutDown,

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(opsfeed::validation))]
    Validation { field: String, reason: String },

    #[error("Invalid JSON payload: {0}")]
    #[diagnostic(code(opsfeed::json), help("Payloads must be a single JSON value."))]
    Json(#[from] serde_json::Error),

    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration error")]
    #[diagnostic(
        code(opsfeed::config),
        help("Inspect the file with: opsfeed config show\nExpected at: {path}")
    )]
    Config {
        path: String,
        #[source]
        source: ConfigError,
    },

    #[error("Config file already exists at {path}")]
    #[diagnostic(
        code(opsfeed::config_exists),
        help("Use --force to overwrite it.")
    )]
    ConfigExists { path: String },

    // ── IO / Serialization ────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to render output: {0}")]
    #[diagnostic(code(opsfeed::render))]
    Render(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::ShutDown => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::Json(_) => exit_code::USAGE,
            Self::Config { .. } | Self::ConfigExists { .. } => exit_code::CONFIG,
            Self::Io(_) | Self::Render(_) => exit_code::GENERAL,
        }
    }

    pub fn config(path: &std::path::Path, source: ConfigError) -> Self {
        Self::Config {
            path: path.display().to_string(),
            source,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed { url, reason },

            CoreError::InvalidEndpoint { endpoint, reason } => CliError::Validation {
                field: format!("endpoint '{endpoint}'"),
                reason,
            },

            CoreError::ShutDown { .. } => CliError::ShutDown,

            CoreError::NoRuntime { operation } => CliError::Render(format!(
                "internal error: {operation} called outside the async runtime"
            )),

            CoreError::Codec { message } => CliError::Validation {
                field: "payload".into(),
                reason: message,
            },

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_error_class() {
        let timeout = CliError::Timeout {
            what: "connection".into(),
            seconds: 10,
        };
        assert_eq!(timeout.exit_code(), exit_code::TIMEOUT);

        let invalid: CliError = CoreError::InvalidEndpoint {
            endpoint: "http://x".into(),
            reason: "bad scheme".into(),
        }
        .into();
        assert_eq!(invalid.exit_code(), exit_code::USAGE);

        let gone: CliError = CoreError::ShutDown { component: "hub" }.into();
        assert_eq!(gone.exit_code(), exit_code::CONNECTION);
    }
}
