//! Gateway Frames
//!
//! Frames are the unit of both directions of the stream. Inbound and
//! outbound frames are wrapped in a `{"payload": [...]}` envelope so several
//! can share one WebSocket message.
//!
//! # Wire Format (JSON)
//!
//! Outbound:
//! ```json
//! {"payload":[{"header":{"service":"chart","id":"CHART#AAPL@DAY1:HOUR1-0","ver":0},
//!              "params":{"symbol":"AAPL"}}]}
//! ```
//!
//! Inbound:
//! ```json
//! {"payload":[{"header":{"service":"chart","id":"CHART#AAPL@DAY1:HOUR1-0","ver":0,"type":"patch"},
//!              "body":{"patches":[{"op":"replace","path":"","value":{}}]}}]}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::service::Service;
use super::signature::CorrelationId;

// =============================================================================
// Inbound
// =============================================================================

/// Kind of an inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameKind {
    /// Complete replacement value for a subtree.
    Snapshot,
    /// Incremental JSON Patch operations for a subtree.
    Patch,
    /// Server-reported failure for the request.
    Error,
    /// Anything the client does not understand.
    #[default]
    #[serde(other)]
    Unknown,
}

/// Header of an inbound frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameHeader {
    /// Wire service tag.
    pub service: String,
    /// Correlation ID echoed from the request.
    #[serde(default)]
    pub id: String,
    /// Request version echoed from the request.
    #[serde(default)]
    pub ver: u64,
    /// Frame kind.
    #[serde(rename = "type", default)]
    pub kind: FrameKind,
}

impl FrameHeader {
    /// Correlation ID carried by this frame.
    #[must_use]
    pub fn correlation_id(&self) -> CorrelationId {
        CorrelationId::from_wire(self.id.clone())
    }
}

/// One inbound frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Frame header.
    pub header: FrameHeader,
    /// Frame body, interpreted according to `header.kind`.
    #[serde(default)]
    pub body: Value,
}

/// Inbound envelope.
///
/// Frames are kept raw and decoded one at a time, so a malformed frame only
/// loses itself and never its siblings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundEnvelope {
    /// Frames carried by this message, undecoded.
    #[serde(default)]
    pub payload: Vec<Value>,
}

impl InboundEnvelope {
    /// Decode each carried frame independently, in order.
    pub fn frames(&self) -> impl Iterator<Item = Result<Frame, serde_json::Error>> + '_ {
        self.payload.iter().map(Frame::deserialize)
    }
}

/// Body of a `patch` frame.
///
/// Operations are kept raw so that one malformed operation can be skipped
/// without rejecting the rest of the batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchBody {
    /// Operations scoped to the bare subtree.
    pub patches: Vec<Value>,
}

/// Body of an `error` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Message surfaced verbatim to the waiting caller.
    pub message: String,
}

// =============================================================================
// Outbound
// =============================================================================

/// Header of an outbound request frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestHeader {
    /// Wire service tag.
    pub service: String,
    /// Correlation ID.
    pub id: String,
    /// Request version (the generation).
    pub ver: u64,
}

/// One outbound request frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestFrame {
    /// Frame header.
    pub header: RequestHeader,
    /// Service-specific parameters.
    pub params: Value,
}

impl RequestFrame {
    /// Build a request frame for a service.
    #[must_use]
    pub fn new(service: Service, id: &CorrelationId, ver: u64, params: Value) -> Self {
        Self {
            header: RequestHeader {
                service: service.as_wire().to_string(),
                id: id.as_str().to_string(),
                ver,
            },
            params,
        }
    }
}

/// Outbound envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    /// Frames to send in one message.
    pub payload: Vec<RequestFrame>,
}

impl RequestEnvelope {
    /// Envelope around a single frame.
    #[must_use]
    pub fn single(frame: RequestFrame) -> Self {
        Self {
            payload: vec![frame],
        }
    }

    /// Envelope around several frames.
    #[must_use]
    pub const fn batch(payload: Vec<RequestFrame>) -> Self {
        Self { payload }
    }
}
