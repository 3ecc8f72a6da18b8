//! Gateway Resolver Port
//!
//! Resolves the WebSocket URL of the streaming gateway before each dial.

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur while resolving the gateway URL.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Config endpoint could not be reached.
    #[error("network error: {0}")]
    Network(String),

    /// Config endpoint answered with a non-success status.
    #[error("unexpected status {0} from config endpoint")]
    Status(u16),

    /// Config response did not decode.
    #[error("invalid config response: {0}")]
    InvalidResponse(String),

    /// Config response carried no URL for the environment.
    #[error("no gateway URL for {0}")]
    EmptyUrl(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::InvalidResponse(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// Port for locating the gateway.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GatewayResolver: Send + Sync {
    /// WebSocket URL to dial.
    ///
    /// # Errors
    ///
    /// Returns error if the URL cannot be determined.
    async fn resolve(&self) -> Result<String, GatewayError>;
}
