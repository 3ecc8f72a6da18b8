//! Gateway Control Messages
//!
//! Wire types exchanged outside the request/response envelope: protocol
//! negotiation, login and gateway discovery.
//!
//! # Session Setup
//!
//! 1. Client sends `{"ver":"27.*.*","fmt":"json-patches-structured","heartbeat":"5s"}`
//! 2. Server answers `{"session":"...","build":"...","ver":"..."}`
//! 3. Client sends a `login` request frame carrying the access token
//! 4. Server answers with a `login` frame (`snapshot`/`patch` or `error`)

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::domain::frame::{RequestEnvelope, RequestFrame};
use crate::domain::service::Service;
use crate::domain::signature::CorrelationId;

// =============================================================================
// Constants
// =============================================================================

/// Correlation ID of the login request.
pub const LOGIN_ID: &str = "login";

/// Login domain.
pub const LOGIN_DOMAIN: &str = "TOS";

/// Login platform.
pub const LOGIN_PLATFORM: &str = "PROD";

/// Login client tag.
pub const LOGIN_TAG: &str = "TOSWeb";

// =============================================================================
// Protocol Negotiation
// =============================================================================

/// First message sent after dialing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolRequest {
    /// Protocol version pattern.
    pub ver: String,
    /// Frame format.
    pub fmt: String,
    /// Heartbeat interval requested from the server.
    pub heartbeat: String,
}

/// Server acknowledgement of the protocol request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolAck {
    /// Session identifier.
    pub session: String,
    /// Server build.
    pub build: String,
    /// Negotiated version.
    pub ver: String,
}

impl ProtocolAck {
    /// Whether every field is present.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.session.is_empty() && !self.build.is_empty() && !self.ver.is_empty()
    }
}

// =============================================================================
// Login
// =============================================================================

/// Parameters of the login request.
///
/// The `Debug` implementation redacts the token for safe logging.
#[derive(Clone, PartialEq, Eq)]
pub struct LoginParams {
    /// Login domain.
    pub domain: String,
    /// Login platform.
    pub platform: String,
    /// Bearer token.
    pub access_token: String,
    /// Client tag.
    pub tag: String,
}

impl std::fmt::Debug for LoginParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginParams")
            .field("domain", &self.domain)
            .field("platform", &self.platform)
            .field("access_token", &"[REDACTED]")
            .field("tag", &self.tag)
            .finish()
    }
}

impl LoginParams {
    /// Login parameters carrying `access_token`.
    #[must_use]
    pub fn new(access_token: &str) -> Self {
        Self {
            domain: LOGIN_DOMAIN.to_string(),
            platform: LOGIN_PLATFORM.to_string(),
            access_token: access_token.to_string(),
            tag: LOGIN_TAG.to_string(),
        }
    }

    /// Envelope holding the single login request frame.
    #[must_use]
    pub fn into_envelope(self) -> RequestEnvelope {
        let params = json!({
            "domain": self.domain,
            "platform": self.platform,
            "accessToken": self.access_token,
            "tag": self.tag,
        });
        RequestEnvelope::single(RequestFrame::new(
            Service::Login,
            &CorrelationId::from_wire(LOGIN_ID),
            0,
            params,
        ))
    }
}

// =============================================================================
// Gateway Discovery
// =============================================================================

/// Gateway URLs per environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MobileGatewayUrls {
    /// Live trading gateway.
    pub livetrading: String,
    /// Paper trading gateway.
    pub papermoney: String,
}

/// Response of the config endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GatewayConfigResponse {
    /// REST API base URL.
    pub api_url: String,
    /// Gateway URLs.
    pub mobile_gateway_url: MobileGatewayUrls,
    /// Authentication URL.
    pub auth_url: String,
}
