//! Connection Supervisor
//!
//! Owns the gateway transport: dial, protocol negotiation, login, the single
//! ingestion task and periodic reconnection.
//!
//! # Connection States
//!
//! ```text
//! Closed -> Handshaking -> Authenticating -> Established -> Closed
//!                                                \-> Reconnecting -> Established
//! ```
//!
//! # Locking
//!
//! The send lock in [`GatewayWriter`] is the only path to the transport.
//! `open`, `close` and both reconnect paths hold it for their whole
//! duration, so request sends queue behind a reconnect instead of racing it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use super::auth::AuthError;
use super::codec::{JsonCodec, is_heartbeat};
use super::messages::{LoginParams, ProtocolAck, ProtocolRequest};
use super::scheduler::ReconnectScheduler;
use super::writer::{GatewayWriter, WsSink, WsSource, close_sink};
use crate::application::dispatcher::FrameDispatcher;
use crate::application::ports::{CredentialProvider, GatewayError, GatewayResolver};
use crate::domain::state::{AuthState, ConnectionState, LinkStatus};
use crate::infrastructure::config::SessionConfig;
use crate::infrastructure::metrics::{self, ReconnectReason};

// =============================================================================
// Error Type
// =============================================================================

/// Errors that can occur while opening or recycling the session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A transport is already open.
    #[error("session is already open")]
    AlreadyOpen,

    /// Gateway URL could not be resolved.
    #[error("gateway resolution failed: {0}")]
    Gateway(#[from] GatewayError),

    /// Dial failed.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Protocol acknowledgement missing or malformed.
    #[error("protocol negotiation failed: {0}")]
    Protocol(String),

    /// Login could not be performed.
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// Transport write or read failed during setup.
    #[error("transport error: {0}")]
    Transport(String),
}

// =============================================================================
// Supervisor
// =============================================================================

/// Lifecycle owner of the gateway connection.
pub struct ConnectionSupervisor {
    config: SessionConfig,
    resolver: Arc<dyn GatewayResolver>,
    credentials: Arc<dyn CredentialProvider>,
    writer: Arc<GatewayWriter>,
    dispatcher: Arc<FrameDispatcher>,
    status: Arc<LinkStatus>,
    codec: JsonCodec,
    ingestion: Mutex<Option<CancellationToken>>,
    scheduler: ReconnectScheduler,
    restarting: AtomicBool,
}

impl std::fmt::Debug for ConnectionSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSupervisor")
            .field("status", &self.status)
            .field("restarting", &self.restarting)
            .finish_non_exhaustive()
    }
}

impl ConnectionSupervisor {
    /// Create a closed supervisor.
    #[must_use]
    pub fn new(
        config: SessionConfig,
        resolver: Arc<dyn GatewayResolver>,
        credentials: Arc<dyn CredentialProvider>,
        writer: Arc<GatewayWriter>,
        dispatcher: Arc<FrameDispatcher>,
        status: Arc<LinkStatus>,
    ) -> Self {
        let scheduler = ReconnectScheduler::new(config.connection.reconnect_interval);
        Self {
            config,
            resolver,
            credentials,
            writer,
            dispatcher,
            status,
            codec: JsonCodec::new(),
            ingestion: Mutex::new(None),
            scheduler,
            restarting: AtomicBool::new(false),
        }
    }

    /// Whether a scheduled reconnect is in progress.
    #[must_use]
    pub fn is_restarting(&self) -> bool {
        self.restarting.load(Ordering::SeqCst)
    }

    /// Open the session: resolve, dial, negotiate, log in, start ingestion
    /// and the reconnect scheduler.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::AlreadyOpen`] if a transport exists, or the
    /// first failure of the setup sequence. A failed open leaves no
    /// transport behind.
    pub async fn open(self: &Arc<Self>) -> Result<(), SessionError> {
        let mut slot = self.writer.lock().await;
        if slot.is_some() {
            return Err(SessionError::AlreadyOpen);
        }
        self.open_locked(&mut slot).await
    }

    /// Close the session and stop the reconnect scheduler.
    pub async fn close(&self) {
        self.scheduler.stop();
        let mut slot = self.writer.lock().await;
        self.close_locked(&mut slot, self.config.connection.close_grace)
            .await;
        self.status.clear();
        tracing::info!("Session closed");
    }

    /// Cancel background tasks without touching the transport.
    pub fn shutdown(&self) {
        self.scheduler.stop();
        if let Some(cancel) = self.ingestion.lock().take() {
            cancel.cancel();
        }
    }

    async fn open_locked(self: &Arc<Self>, slot: &mut Option<WsSink>) -> Result<(), SessionError> {
        self.status.set_connection(ConnectionState::Handshaking);

        let result = self.establish(slot).await;
        if let Err(e) = &result {
            tracing::warn!(error = %e, "Session open failed");
            self.status.clear();
        }
        result
    }

    async fn establish(self: &Arc<Self>, slot: &mut Option<WsSink>) -> Result<(), SessionError> {
        let url = self.resolver.resolve().await?;
        tracing::info!(url = %url, "Connecting to gateway");

        // Err means a provider is already installed process-wide.
        let _ = rustls::crypto::ring::default_provider().install_default();
        let (stream, _response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| SessionError::Connection(e.to_string()))?;
        self.status.set_auth(AuthState::Connected);

        let (mut sink, mut source) = stream.split();
        if let Err(e) = self.negotiate(&mut sink, &mut source).await {
            close_sink(sink, Duration::ZERO).await;
            return Err(e);
        }

        *slot = Some(sink);
        self.status.set_connection(ConnectionState::Established);
        self.spawn_ingestion(source);
        self.start_scheduler();
        tracing::info!("Session established");
        Ok(())
    }

    async fn negotiate(
        &self,
        sink: &mut WsSink,
        source: &mut WsSource,
    ) -> Result<(), SessionError> {
        let protocol = &self.config.protocol;
        let request = ProtocolRequest {
            ver: protocol.version.clone(),
            fmt: protocol.format.clone(),
            heartbeat: protocol.heartbeat.clone(),
        };
        self.write(sink, &request)
            .await
            .map_err(SessionError::Transport)?;

        let timeout = self.config.connection.handshake_timeout;
        let ack = tokio::time::timeout(timeout, self.read_ack(source))
            .await
            .map_err(|_| {
                SessionError::Protocol(format!("no acknowledgement within {timeout:?}"))
            })??;
        if !ack.is_complete() {
            return Err(SessionError::Protocol(format!(
                "incomplete acknowledgement: {ack:?}"
            )));
        }
        tracing::debug!(session = %ack.session, build = %ack.build, ver = %ack.ver, "Protocol negotiated");

        self.status.set_connection(ConnectionState::Authenticating);
        self.status.set_auth(AuthState::Authenticating);

        let token = self
            .credentials
            .access_token()
            .await
            .map_err(AuthError::from)?;
        let login = LoginParams::new(token.expose()).into_envelope();
        self.write(sink, &login)
            .await
            .map_err(AuthError::LoginSend)?;
        tracing::debug!("Login sent");
        Ok(())
    }

    async fn read_ack(&self, source: &mut WsSource) -> Result<ProtocolAck, SessionError> {
        while let Some(message) = source.next().await {
            match message.map_err(|e| SessionError::Transport(e.to_string()))? {
                Message::Text(text) if is_heartbeat(&text) => {}
                Message::Text(text) => {
                    return self.codec.decode_as(&text).map_err(|e| {
                        SessionError::Protocol(format!("undecodable acknowledgement: {e}"))
                    });
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
        Err(SessionError::Protocol(
            "connection closed before acknowledgement".to_string(),
        ))
    }

    async fn write<T: serde::Serialize>(&self, sink: &mut WsSink, value: &T) -> Result<(), String> {
        let json = self.codec.encode(value).map_err(|e| e.to_string())?;
        sink.send(Message::Text(json.into()))
            .await
            .map_err(|e| e.to_string())
    }

    async fn close_locked(&self, slot: &mut Option<WsSink>, grace: Duration) {
        if let Some(cancel) = self.ingestion.lock().take() {
            cancel.cancel();
        }
        if let Some(sink) = slot.take() {
            close_sink(sink, grace).await;
        }
    }

    // =========================================================================
    // Background Tasks
    // =========================================================================

    fn spawn_ingestion(self: &Arc<Self>, source: WsSource) {
        let cancel = CancellationToken::new();
        if let Some(previous) = self.ingestion.lock().replace(cancel.clone()) {
            previous.cancel();
        }
        tokio::spawn(Arc::clone(self).ingest(source, cancel));
    }

    fn start_scheduler(self: &Arc<Self>) {
        let supervisor = Arc::downgrade(self);
        self.scheduler.start(move || {
            let supervisor = supervisor.upgrade();
            async move {
                if let Some(supervisor) = supervisor {
                    supervisor.scheduled_reconnect().await;
                }
            }
        });
    }

    async fn ingest(self: Arc<Self>, mut source: WsSource, cancel: CancellationToken) {
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    tracing::debug!("Ingestion cancelled");
                    return;
                }
                message = source.next() => match message {
                    Some(Ok(Message::Text(text))) => self.dispatcher.dispatch(&text),
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("Gateway sent close frame");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "Gateway read failed");
                        break;
                    }
                    None => {
                        tracing::info!("Gateway stream ended");
                        break;
                    }
                },
            }
        }

        if self.is_restarting() || cancel.is_cancelled() {
            tracing::debug!("Ingestion stopped for reconnect");
            return;
        }
        self.recover(&cancel).await;
    }

    /// One reset and reopen after an unexpected connection loss.
    async fn recover(self: &Arc<Self>, cancel: &CancellationToken) {
        let mut slot = self.writer.lock().await;
        if cancel.is_cancelled() {
            return;
        }

        tracing::warn!("Connection lost, reconnecting");
        self.status.set_connection(ConnectionState::Reconnecting);
        self.close_locked(&mut slot, Duration::ZERO).await;
        self.dispatcher.reset();

        match self.open_locked(&mut slot).await {
            Ok(()) => metrics::record_reconnect(ReconnectReason::ConnectionLost),
            Err(e) => tracing::error!(error = %e, "Reconnect after connection loss failed"),
        }
    }

    async fn scheduled_reconnect(self: &Arc<Self>) {
        self.restarting.store(true, Ordering::SeqCst);
        let mut slot = self.writer.lock().await;

        if self.scheduler.is_running() {
            tracing::info!("Scheduled reconnect");
            self.status.set_connection(ConnectionState::Reconnecting);
            self.close_locked(&mut slot, self.config.connection.close_grace)
                .await;
            match self.open_locked(&mut slot).await {
                Ok(()) => metrics::record_reconnect(ReconnectReason::Scheduled),
                Err(e) => tracing::error!(error = %e, "Scheduled reconnect failed"),
            }
            tokio::time::sleep(self.config.connection.settle_delay).await;
        }

        drop(slot);
        self.restarting.store(false, Ordering::SeqCst);
    }
}
