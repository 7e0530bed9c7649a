use thiserror::Error;

/// Top-level error type for the `opsfeed-api` crate.
///
/// Covers the transport and codec failure modes. `opsfeed-core` maps
/// these into its own error type; most of them never reach callers
/// because the connection manager recovers from them on its own.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ── WebSocket ───────────────────────────────────────────────────
    /// WebSocket connection failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// WebSocket closed unexpectedly.
    #[error("WebSocket closed (code {code}): {reason}")]
    WebSocketClosed { code: u16, reason: String },

    // ── Data ────────────────────────────────────────────────────────
    /// Inbound frame was not valid JSON.
    #[error("Failed to decode frame: {0}")]
    Decode(#[source] serde_json::Error),

    /// Outbound message could not be serialized.
    #[error("Failed to encode frame: {0}")]
    Encode(#[source] serde_json::Error),
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::WebSocketConnect(_) | Self::WebSocketClosed { .. }
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_are_transient() {
        assert!(Error::WebSocketConnect("refused".into()).is_transient());
        assert!(
            Error::WebSocketClosed {
                code: 1006,
                reason: String::new()
            }
            .is_transient()
        );
    }

    #[test]
    fn codec_errors_are_not_transient() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(!Error::Decode(err).is_transient());
    }
}
