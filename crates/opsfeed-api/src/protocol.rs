//! Wire codec for the opsfeed frame protocol.
//!
//! Frames are JSON text. Outbound control frames carry a `type` tag and
//! the topic under the `endpoint` key; any other outbound message is
//! passed through untouched. Inbound frames are arbitrary JSON with no
//! envelope or topic tagging.

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Outbound control frame managing topic interest on the server.
///
/// ```rust,ignore
/// let text = ControlFrame::subscribe("process").encode()?;
/// assert_eq!(text, r#"{"type":"subscribe","endpoint":"process"}"#);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlFrame {
    Subscribe { endpoint: String },
    Unsubscribe { endpoint: String },
}

impl ControlFrame {
    pub fn subscribe(topic: impl Into<String>) -> Self {
        Self::Subscribe {
            endpoint: topic.into(),
        }
    }

    pub fn unsubscribe(topic: impl Into<String>) -> Self {
        Self::Unsubscribe {
            endpoint: topic.into(),
        }
    }

    /// Topic this frame refers to.
    pub fn topic(&self) -> &str {
        match self {
            Self::Subscribe { endpoint } | Self::Unsubscribe { endpoint } => endpoint,
        }
    }

    /// Serialize to the JSON text sent over the wire.
    pub fn encode(&self) -> Result<String, Error> {
        serde_json::to_string(self).map_err(Error::Encode)
    }
}

/// Decode an inbound text frame into a JSON value.
///
/// Any well-formed JSON is accepted; the payload is treated as the
/// latest data snapshot, not validated against a schema.
pub fn decode_inbound(text: &str) -> Result<serde_json::Value, Error> {
    serde_json::from_str(text).map_err(Error::Decode)
}

/// Encode an arbitrary outbound message as a text frame.
pub fn encode_message(message: &serde_json::Value) -> Result<String, Error> {
    serde_json::to_string(message).map_err(Error::Encode)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_frame_wire_format() {
        let text = ControlFrame::subscribe("process").encode().unwrap();
        assert_eq!(text, r#"{"type":"subscribe","endpoint":"process"}"#);
    }

    #[test]
    fn unsubscribe_frame_wire_format() {
        let text = ControlFrame::unsubscribe("quality").encode().unwrap();
        assert_eq!(text, r#"{"type":"unsubscribe","endpoint":"quality"}"#);
    }

    #[test]
    fn control_frame_parses_back_from_wire() {
        let frame: ControlFrame =
            serde_json::from_str(r#"{"type":"unsubscribe","endpoint":"sales"}"#).unwrap();
        assert_eq!(frame, ControlFrame::unsubscribe("sales"));
        assert_eq!(frame.topic(), "sales");
    }

    #[test]
    fn decode_accepts_any_json() {
        let value = decode_inbound(r#"{"temperature": 71.5, "line": "A"}"#).unwrap();
        assert_eq!(value["temperature"], 71.5);

        let scalar = decode_inbound("42").unwrap();
        assert_eq!(scalar, serde_json::json!(42));
    }

    #[test]
    fn decode_rejects_malformed_text() {
        let err = decode_inbound("{not json").unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn encode_message_passes_through() {
        let msg = serde_json::json!({"type": "ping", "seq": 3});
        let text = encode_message(&msg).unwrap();
        assert_eq!(decode_inbound(&text).unwrap(), msg);
    }
}
