//! Frame Sender Port
//!
//! The only way the correlator reaches the transport. Implemented by the
//! connection supervisor, which serializes every write behind its send lock.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::frame::RequestEnvelope;

/// Errors that can occur while sending a request envelope.
#[derive(Debug, Clone, Error)]
pub enum SendError {
    /// No transport is open.
    #[error("not connected")]
    NotConnected,

    /// Envelope could not be serialized.
    #[error("encode error: {0}")]
    Encode(String),

    /// Transport write failed.
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<serde_json::Error> for SendError {
    fn from(err: serde_json::Error) -> Self {
        Self::Encode(err.to_string())
    }
}

/// Port for writing request envelopes to the gateway.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FrameSender: Send + Sync {
    /// Send one envelope as a single message.
    ///
    /// # Errors
    ///
    /// Returns error if no transport is open or the write fails.
    async fn send(&self, envelope: &RequestEnvelope) -> Result<(), SendError>;
}
