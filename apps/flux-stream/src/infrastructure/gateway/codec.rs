//! Gateway Codec
//!
//! JSON encoding and decoding for gateway text messages.
//!
//! Inbound messages are either heartbeats (`{"heartbeat": <millis>}`) or
//! frame envelopes. Heartbeats are recognized from the first key without a
//! full parse, since they dominate the stream on idle sessions.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::domain::frame::InboundEnvelope;

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON encoding/decoding failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid message format.
    #[error("invalid message format: {0}")]
    InvalidFormat(String),
}

/// A decoded inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Keep-alive; carries nothing.
    Heartbeat,
    /// Frames to dispatch.
    Envelope(InboundEnvelope),
}

/// Whether a text message is a heartbeat.
///
/// Matches a JSON object whose first key is `heartbeat`.
#[must_use]
pub fn is_heartbeat(text: &str) -> bool {
    text.trim_start()
        .strip_prefix('{')
        .is_some_and(|rest| rest.trim_start().starts_with("\"heartbeat\""))
}

/// JSON codec for gateway messages.
#[derive(Debug, Default, Clone)]
pub struct JsonCodec;

impl JsonCodec {
    /// Create a new JSON codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode an inbound text message.
    ///
    /// # Errors
    ///
    /// Returns an error if the message is neither a heartbeat nor a valid
    /// envelope.
    pub fn decode(&self, text: &str) -> Result<Inbound, CodecError> {
        if is_heartbeat(text) {
            return Ok(Inbound::Heartbeat);
        }

        let trimmed = text.trim();
        if !trimmed.starts_with('{') {
            return Err(CodecError::InvalidFormat(format!(
                "expected JSON object, got: {}...",
                trimmed.chars().take(50).collect::<String>()
            )));
        }

        Ok(Inbound::Envelope(serde_json::from_str(trimmed)?))
    }

    /// Decode a control message (e.g. the protocol acknowledgement).
    ///
    /// # Errors
    ///
    /// Returns an error if JSON parsing fails.
    pub fn decode_as<T: DeserializeOwned>(&self, text: &str) -> Result<T, CodecError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Encode a value to JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn encode<T: Serialize>(&self, value: &T) -> Result<String, CodecError> {
        Ok(serde_json::to_string(value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::frame::FrameKind;
    use test_case::test_case;

    #[test_case(r#"{"heartbeat":1700000000000}"#, true ; "compact")]
    #[test_case(" { \"heartbeat\" : 1 }", true ; "spaced")]
    #[test_case(r#"{"payload":[],"heartbeat":1}"#, false ; "not first key")]
    #[test_case(r#"{"payload":[{"body":{"heartbeat":1}}]}"#, false ; "nested")]
    #[test_case("heartbeat", false ; "bare word")]
    fn heartbeat_detection(text: &str, expected: bool) {
        assert_eq!(is_heartbeat(text), expected);
    }

    #[test]
    fn decode_envelope() {
        let codec = JsonCodec::new();
        let text = r#"{"payload":[{"header":{"service":"quotes","id":"Q-0","ver":0,"type":"snapshot"},"body":{}}]}"#;

        let Inbound::Envelope(envelope) = codec.decode(text).unwrap() else {
            panic!("expected envelope");
        };
        let frames: Vec<_> = envelope.frames().collect::<Result<_, _>>().unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].header.kind, FrameKind::Snapshot);
    }

    #[test]
    fn decode_heartbeat() {
        let codec = JsonCodec::new();
        assert_eq!(codec.decode(r#"{"heartbeat":1}"#).unwrap(), Inbound::Heartbeat);
    }

    #[test]
    fn decode_rejects_non_object() {
        let codec = JsonCodec::new();
        assert!(matches!(codec.decode("[1,2]"), Err(CodecError::InvalidFormat(_))));
        assert!(matches!(codec.decode("{oops"), Err(CodecError::Json(_))));
    }

    #[test]
    fn encode_roundtrips_value() {
        let codec = JsonCodec::new();
        let encoded = codec.encode(&serde_json::json!({"a": 1})).unwrap();
        assert_eq!(encoded, r#"{"a":1}"#);
    }
}
