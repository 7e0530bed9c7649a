//! Configuration for opsfeed consumers.
//!
//! TOML file + `OPSFEED_` environment overrides, and translation to
//! `opsfeed_core::HubConfig`. The core never reads configuration itself;
//! binaries load it here and hand the result in.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use opsfeed_core::config::parse_endpoint;
use opsfeed_core::{AlertConfig, ConnectionConfig, DEFAULT_ENDPOINT, HubConfig, ReconnectConfig, Severity};

/// Environment variable prefix. Nested keys are separated by `__`,
/// e.g. `OPSFEED_CONNECTION__ENDPOINT`.
pub const ENV_PREFIX: &str = "OPSFEED_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Output defaults for the CLI.
    #[serde(default)]
    pub defaults: Defaults,

    #[serde(default)]
    pub connection: ConnectionSettings,

    #[serde(default)]
    pub alerts: AlertSettings,

    /// Threshold rules evaluated against inbound payloads.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<Rule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}

/// `[connection]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ConnectionSettings {
    /// WebSocket endpoint (`ws://` or `wss://`).
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Topics subscribed on startup.
    #[serde(default)]
    pub topics: Vec<String>,

    /// Delay before reconnecting after a close.
    #[serde(default = "default_reconnect_ms")]
    pub reconnect_delay_ms: u64,

    /// Backoff ceiling. Equal to `reconnect_delay_ms` for a fixed delay.
    #[serde(default = "default_reconnect_ms")]
    pub max_reconnect_delay_ms: u64,

    /// Give up after this many consecutive failed reconnects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            topics: Vec::new(),
            reconnect_delay_ms: default_reconnect_ms(),
            max_reconnect_delay_ms: default_reconnect_ms(),
            max_retries: None,
        }
    }
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.into()
}
fn default_reconnect_ms() -> u64 {
    5_000
}

/// `[alerts]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AlertSettings {
    #[serde(default = "default_max_alerts")]
    pub max_alerts: usize,

    #[serde(default = "default_info_secs")]
    pub info_auto_dismiss_secs: u64,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            max_alerts: default_max_alerts(),
            info_auto_dismiss_secs: default_info_secs(),
        }
    }
}

fn default_max_alerts() -> usize {
    100
}
fn default_info_secs() -> u64 {
    5
}

/// A `[[rules]]` entry: raise an alert when the value at `pointer` in an
/// inbound payload crosses a bound.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Rule {
    pub name: String,

    /// JSON pointer into the payload, e.g. `/temperature`.
    pub pointer: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub above: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub below: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equals: Option<serde_json::Value>,

    #[serde(default = "default_rule_severity")]
    pub severity: Severity,

    /// Alert message. `{value}` and `{name}` are substituted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Alert source tag. Defaults to the rule name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

fn default_rule_severity() -> Severity {
    Severity::Warning
}

impl Rule {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.pointer.is_empty() && !self.pointer.starts_with('/') {
            return Err(ConfigError::Validation {
                field: format!("rules.{}.pointer", self.name),
                reason: format!("'{}' is not a JSON pointer (must start with '/')", self.pointer),
            });
        }
        if self.above.is_none() && self.below.is_none() && self.equals.is_none() {
            return Err(ConfigError::Validation {
                field: format!("rules.{}", self.name),
                reason: "needs at least one of 'above', 'below', 'equals'".into(),
            });
        }
        Ok(())
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "opsfeed", "opsfeed").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("opsfeed");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file + environment. A missing file is not an error.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    for rule in &config.rules {
        rule.validate()?;
    }
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Translation to core config ──────────────────────────────────────

impl Config {
    /// Build the core's `HubConfig`, validating the endpoint.
    pub fn hub_config(&self) -> Result<HubConfig, ConfigError> {
        let conn = &self.connection;
        let endpoint = parse_endpoint(&conn.endpoint).map_err(|e| ConfigError::Validation {
            field: "connection.endpoint".into(),
            reason: e.to_string(),
        })?;

        if conn.reconnect_delay_ms == 0 {
            return Err(ConfigError::Validation {
                field: "connection.reconnect_delay_ms".into(),
                reason: "must be greater than zero".into(),
            });
        }

        if self.alerts.max_alerts == 0 {
            return Err(ConfigError::Validation {
                field: "alerts.max_alerts".into(),
                reason: "must be at least 1".into(),
            });
        }

        Ok(HubConfig {
            connection: ConnectionConfig {
                endpoint,
                reconnect: ReconnectConfig {
                    initial_delay: Duration::from_millis(conn.reconnect_delay_ms),
                    max_delay: Duration::from_millis(conn.max_reconnect_delay_ms),
                    max_retries: conn.max_retries,
                },
            },
            alerts: AlertConfig {
                max_alerts: self.alerts.max_alerts,
                info_auto_dismiss: Duration::from_secs(self.alerts.info_auto_dismiss_secs),
            },
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use figment::Jail;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_match_core_defaults() {
        let hub = Config::default().hub_config().unwrap();
        assert_eq!(hub, HubConfig::default());
    }

    #[test]
    fn zero_max_alerts_is_rejected() {
        let mut cfg = Config::default();
        cfg.alerts.max_alerts = 0;

        let err = cfg.hub_config().unwrap_err();
        assert!(
            matches!(&err, ConfigError::Validation { field, .. } if field == "alerts.max_alerts"),
            "got {err:?}"
        );
    }

    #[test]
    fn missing_file_yields_defaults() {
        Jail::expect_with(|_jail| {
            let cfg = load_config_from(Path::new("does-not-exist.toml")).unwrap();
            assert_eq!(cfg, Config::default());
            Ok(())
        });
    }

    #[test]
    fn file_and_env_layer_in_order() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "opsfeed.toml",
                r#"
                [connection]
                endpoint = "ws://plant.local:9000/live"
                topics = ["process", "quality"]
                reconnect_delay_ms = 1000

                [alerts]
                max_alerts = 50

                [[rules]]
                name = "hot"
                pointer = "/temperature"
                above = 90.0
                severity = "critical"
                "#,
            )?;
            jail.set_env("OPSFEED_ALERTS__MAX_ALERTS", "25");

            let cfg = load_config_from(Path::new("opsfeed.toml")).unwrap();
            assert_eq!(cfg.connection.endpoint, "ws://plant.local:9000/live");
            assert_eq!(cfg.connection.topics, vec!["process", "quality"]);
            assert_eq!(cfg.alerts.max_alerts, 25, "env wins over file");
            assert_eq!(cfg.rules.len(), 1);
            assert_eq!(cfg.rules[0].severity, Severity::Critical);

            let hub = cfg.hub_config().unwrap();
            assert_eq!(hub.connection.reconnect.initial_delay, Duration::from_secs(1));
            assert_eq!(hub.alerts.max_alerts, 25);
            Ok(())
        });
    }

    #[test]
    fn invalid_rule_is_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "opsfeed.toml",
                r#"
                [[rules]]
                name = "nothing"
                pointer = "/x"
                "#,
            )?;
            let err = load_config_from(Path::new("opsfeed.toml")).unwrap_err();
            assert!(matches!(err, ConfigError::Validation { .. }), "got {err:?}");
            Ok(())
        });
    }

    #[test]
    fn non_websocket_endpoint_is_rejected() {
        let mut cfg = Config::default();
        cfg.connection.endpoint = "http://localhost:8080".into();
        let err = cfg.hub_config().unwrap_err();
        assert!(err.to_string().contains("connection.endpoint"));
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        cfg.connection.topics = vec!["sales".into()];
        cfg.rules.push(Rule {
            name: "slow-line".into(),
            pointer: "/rate".into(),
            above: None,
            below: Some(10.0),
            equals: None,
            severity: Severity::Error,
            message: Some("Line rate {value} below target".into()),
            source: Some("production".into()),
        });

        save_config_to(&cfg, &path).unwrap();
        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded, cfg);
    }
}
