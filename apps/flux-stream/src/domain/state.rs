//! Session Status
//!
//! Connection and authentication state shared between the supervisor, which
//! drives the connection lifecycle, and the dispatcher, which observes login
//! acknowledgements on the ingestion task.

use parking_lot::RwLock;

/// Lifecycle of the gateway connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No transport.
    #[default]
    Closed,
    /// Dialed; protocol negotiation in progress.
    Handshaking,
    /// Protocol acknowledged; login not yet confirmed.
    Authenticating,
    /// Handshake done, login sent and ingestion running.
    Established,
    /// Scheduled or recovery reconnect in progress.
    Reconnecting,
}

/// Current state of authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthState {
    /// Not yet connected or authentication not started.
    #[default]
    Disconnected,

    /// Connected but not authenticated.
    Connected,

    /// Login request sent, awaiting response.
    Authenticating,

    /// Login acknowledged by the gateway.
    Authenticated,

    /// Login rejected by the gateway.
    Failed,
}

impl AuthState {
    /// Check if currently authenticated.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated)
    }

    /// Check if authentication is in progress.
    #[must_use]
    pub const fn is_authenticating(&self) -> bool {
        matches!(self, Self::Authenticating)
    }
}

/// Shared connection and authentication state.
#[derive(Debug, Default)]
pub struct LinkStatus {
    connection: RwLock<ConnectionState>,
    auth: RwLock<AuthState>,
}

impl LinkStatus {
    /// Create a closed, unauthenticated status.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current connection state.
    #[must_use]
    pub fn connection(&self) -> ConnectionState {
        *self.connection.read()
    }

    /// Current authentication state.
    #[must_use]
    pub fn auth(&self) -> AuthState {
        *self.auth.read()
    }

    /// Whether the session is established.
    #[must_use]
    pub fn is_established(&self) -> bool {
        self.connection() == ConnectionState::Established
    }

    /// Move to a new connection state.
    pub fn set_connection(&self, state: ConnectionState) {
        *self.connection.write() = state;
    }

    /// Move to a new authentication state.
    pub fn set_auth(&self, state: AuthState) {
        *self.auth.write() = state;
    }

    /// Record a login acknowledgement.
    pub fn accept_login(&self) {
        self.set_auth(AuthState::Authenticated);
    }

    /// Record a login rejection. An established session falls back to
    /// `Authenticating`; the transport stays up until closed.
    pub fn reject_login(&self) {
        self.set_auth(AuthState::Failed);
        let mut connection = self.connection.write();
        if *connection == ConnectionState::Established {
            *connection = ConnectionState::Authenticating;
        }
    }

    /// Return to the closed, unauthenticated state.
    pub fn clear(&self) {
        self.set_connection(ConnectionState::Closed);
        self.set_auth(AuthState::Disconnected);
    }
}
