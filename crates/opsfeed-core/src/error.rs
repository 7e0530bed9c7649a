// ── Core error types ──
//
// User-facing errors from opsfeed-core. Transport failures are recovered
// internally by the connection manager, so only a handful of conditions
// ever reach callers. The `From<opsfeed_api::Error>` impl translates the
// transport-layer errors that do escape.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Lifecycle errors ─────────────────────────────────────────────
    /// The owning hub or manager has been torn down. Using it afterwards
    /// is a wiring bug, not a runtime condition.
    #[error("{component} used after shutdown")]
    ShutDown { component: &'static str },

    #[error("No Tokio runtime available: {operation} must run inside a runtime")]
    NoRuntime { operation: &'static str },

    // ── Connection errors ────────────────────────────────────────────
    #[error("Invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("Cannot connect to {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Frame codec error: {message}")]
    Codec { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<opsfeed_api::Error> for CoreError {
    fn from(err: opsfeed_api::Error) -> Self {
        match err {
            opsfeed_api::Error::InvalidUrl(e) => CoreError::InvalidEndpoint {
                endpoint: String::new(),
                reason: e.to_string(),
            },
            opsfeed_api::Error::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("WebSocket connection failed: {reason}"),
            },
            opsfeed_api::Error::WebSocketClosed { code, reason } => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("WebSocket closed (code {code}): {reason}"),
            },
            opsfeed_api::Error::Encode(e) | opsfeed_api::Error::Decode(e) => CoreError::Codec {
                message: e.to_string(),
            },
        }
    }
}
