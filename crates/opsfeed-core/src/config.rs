// ── Runtime configuration ──
//
// These types describe *how* the realtime core behaves: where to connect,
// how to back off, how many alerts to keep. They never touch disk.
// Consumers (the CLI, an embedding application) construct a `HubConfig`
// and hand it in.

use std::time::Duration;

use url::Url;

use crate::error::CoreError;

/// Development endpoint used when nothing else is configured.
pub const DEFAULT_ENDPOINT: &str = "ws://localhost:8080/ws";

/// Reconnection schedule after the transport closes.
///
/// The default is a fixed five second delay retried forever. Setting
/// `max_delay` above `initial_delay` turns on capped exponential backoff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 5s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 5s (fixed delay).
    pub max_delay: Duration,

    /// Maximum consecutive reconnection attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(5),
            max_retries: None,
        }
    }
}

impl ReconnectConfig {
    /// Fixed delay, unbounded retries.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            initial_delay: delay,
            max_delay: delay,
            max_retries: None,
        }
    }

    /// Delay before reconnect attempt number `attempt` (zero-based).
    ///
    /// `delay = min(initial * 2^attempt, max)`, never below `initial`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(16));
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay.max(self.initial_delay))
    }
}

/// Where and how the connection manager connects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Server endpoint, fixed for the manager's lifetime.
    pub endpoint: Url,
    /// Reconnect schedule.
    pub reconnect: ReconnectConfig,
}

impl ConnectionConfig {
    /// Build a config for `endpoint` with the default reconnect schedule.
    pub fn new(endpoint: &str) -> Result<Self, CoreError> {
        let endpoint = parse_endpoint(endpoint)?;
        Ok(Self {
            endpoint,
            reconnect: ReconnectConfig::default(),
        })
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            endpoint: Url::parse(DEFAULT_ENDPOINT).expect("default endpoint is a valid URL"),
            reconnect: ReconnectConfig::default(),
        }
    }
}

/// Alert queue tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertConfig {
    /// Upper bound on retained alerts; the oldest are evicted first.
    pub max_alerts: usize,
    /// Auto-dismiss delay applied to `Info` alerts that don't specify one.
    pub info_auto_dismiss: Duration,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            max_alerts: 100,
            info_auto_dismiss: Duration::from_secs(5),
        }
    }
}

/// Everything the [`Hub`](crate::Hub) needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HubConfig {
    pub connection: ConnectionConfig,
    pub alerts: AlertConfig,
}

/// Parse and validate a WebSocket endpoint URL.
pub fn parse_endpoint(raw: &str) -> Result<Url, CoreError> {
    let url = Url::parse(raw).map_err(|e| CoreError::InvalidEndpoint {
        endpoint: raw.to_owned(),
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "ws" | "wss" => Ok(url),
        other => Err(CoreError::InvalidEndpoint {
            endpoint: raw.to_owned(),
            reason: format!("expected a ws:// or wss:// URL, got scheme '{other}'"),
        }),
    }
}
