//! Gateway Writer
//!
//! Owns the send half of the WebSocket. Every outbound message goes through
//! one async mutex, which reconnection also holds while it swaps the
//! transport; calls issued meanwhile wait for the new connection.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::SinkExt;
use futures_util::stream::{SplitSink, SplitStream};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, MutexGuard};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::codec::JsonCodec;
use crate::application::ports::{FrameSender, SendError};
use crate::domain::frame::RequestEnvelope;

/// WebSocket connection to the gateway.
pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Send half of the connection.
pub type WsSink = SplitSink<WsStream, Message>;

/// Receive half of the connection.
pub type WsSource = SplitStream<WsStream>;

/// Serialized write path to the gateway.
#[derive(Default)]
pub struct GatewayWriter {
    sink: Mutex<Option<WsSink>>,
    codec: JsonCodec,
}

impl std::fmt::Debug for GatewayWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayWriter").finish_non_exhaustive()
    }
}

impl GatewayWriter {
    /// Create a writer with no transport attached.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the send lock.
    pub async fn lock(&self) -> MutexGuard<'_, Option<WsSink>> {
        self.sink.lock().await
    }

    /// Whether a transport is attached.
    pub async fn is_open(&self) -> bool {
        self.sink.lock().await.is_some()
    }

    /// Serialize `value` and write it as one text message.
    ///
    /// # Errors
    ///
    /// Returns an error if no transport is attached, serialization fails or
    /// the write fails.
    pub async fn send_json<T: Serialize + Sync>(
        &self,
        slot: &mut Option<WsSink>,
        value: &T,
    ) -> Result<(), SendError> {
        let sink = slot.as_mut().ok_or(SendError::NotConnected)?;
        let json = self
            .codec
            .encode(value)
            .map_err(|e| SendError::Encode(e.to_string()))?;
        sink.send(Message::Text(json.into()))
            .await
            .map_err(|e| SendError::Transport(e.to_string()))
    }
}

/// Send a normal close frame, wait `grace`, then close and drop the sink.
pub async fn close_sink(mut sink: WsSink, grace: Duration) {
    let frame = CloseFrame {
        code: CloseCode::Normal,
        reason: "".into(),
    };
    match sink.send(Message::Close(Some(frame))).await {
        Ok(()) if !grace.is_zero() => tokio::time::sleep(grace).await,
        Ok(()) => {}
        Err(e) => tracing::debug!(error = %e, "Close frame not sent"),
    }
    if let Err(e) = sink.close().await {
        tracing::debug!(error = %e, "Transport close failed");
    }
}

#[async_trait]
impl FrameSender for GatewayWriter {
    async fn send(&self, envelope: &RequestEnvelope) -> Result<(), SendError> {
        let mut slot = self.sink.lock().await;
        self.send_json(&mut slot, envelope).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::frame::RequestFrame;
    use crate::domain::service::Service;
    use crate::domain::signature::CorrelationId;

    #[tokio::test]
    async fn send_without_transport_is_not_connected() {
        let writer = GatewayWriter::new();
        assert!(!writer.is_open().await);

        let envelope = RequestEnvelope::single(RequestFrame::new(
            Service::Chart,
            &CorrelationId::from_wire("CHART#AAPL@DAY1:HOUR1-0"),
            0,
            serde_json::json!({}),
        ));
        assert!(matches!(
            writer.send(&envelope).await,
            Err(SendError::NotConnected)
        ));
    }
}
