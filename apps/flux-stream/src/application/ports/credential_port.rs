//! Credential Provider Port
//!
//! Supplies the bearer token sent in the login frame. Token acquisition
//! (OAuth, refresh, storage) happens outside this crate.

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur while obtaining a token.
#[derive(Debug, Clone, Error)]
pub enum CredentialError {
    /// Required environment variable is missing.
    #[error("missing environment variable: {0}")]
    MissingEnvVar(String),

    /// Token is empty.
    #[error("access token is empty")]
    Empty,

    /// Provider-specific failure.
    #[error("credential provider failed: {0}")]
    Provider(String),
}

/// Opaque bearer token.
///
/// The `Debug` implementation redacts the token for safe logging.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    /// Wrap a token.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is empty or whitespace.
    pub fn new(token: impl Into<String>) -> Result<Self, CredentialError> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(CredentialError::Empty);
        }
        Ok(Self(token))
    }

    /// Raw token, for the login frame only.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken([REDACTED])")
    }
}

/// Port for obtaining the access token used at login.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Current access token.
    ///
    /// # Errors
    ///
    /// Returns error if no token is available.
    async fn access_token(&self) -> Result<BearerToken, CredentialError>;
}
