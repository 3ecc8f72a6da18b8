//! Gateway Authentication
//!
//! Credential providers for the login frame.
//!
//! # Login Flow
//!
//! 1. After the protocol acknowledgement, a token is obtained from the
//!    configured [`CredentialProvider`]
//! 2. One `login` request frame carrying the token is sent
//! 3. The acknowledgement arrives through the ingestion task and updates
//!    the session's auth state

use async_trait::async_trait;

use crate::application::ports::{BearerToken, CredentialError, CredentialProvider, SendError};

/// Environment variable read by [`EnvCredentials`].
pub const ACCESS_TOKEN_VAR: &str = "FLUX_ACCESS_TOKEN";

/// Errors raised while logging in.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No token could be obtained.
    #[error("credential error: {0}")]
    Credential(#[from] CredentialError),

    /// Login frame could not be written.
    #[error("failed to send login: {0}")]
    LoginSend(String),
}

impl From<SendError> for AuthError {
    fn from(err: SendError) -> Self {
        Self::LoginSend(err.to_string())
    }
}

/// Fixed token supplied by the caller.
#[derive(Debug, Clone)]
pub struct StaticCredentials {
    token: BearerToken,
}

impl StaticCredentials {
    /// Wrap an already obtained token.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is blank.
    pub fn new(token: impl Into<String>) -> Result<Self, CredentialError> {
        Ok(Self {
            token: BearerToken::new(token)?,
        })
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn access_token(&self) -> Result<BearerToken, CredentialError> {
        Ok(self.token.clone())
    }
}

/// Token read from an environment variable on every login.
///
/// Re-reading lets an external refresher rotate the token between
/// reconnects.
#[derive(Debug, Clone)]
pub struct EnvCredentials {
    var: String,
}

impl Default for EnvCredentials {
    fn default() -> Self {
        Self::new(ACCESS_TOKEN_VAR)
    }
}

impl EnvCredentials {
    /// Read the token from `var`.
    #[must_use]
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }

    /// Variable name.
    #[must_use]
    pub fn var(&self) -> &str {
        &self.var
    }
}

#[async_trait]
impl CredentialProvider for EnvCredentials {
    async fn access_token(&self) -> Result<BearerToken, CredentialError> {
        let token = std::env::var(&self.var)
            .map_err(|_| CredentialError::MissingEnvVar(self.var.clone()))?;
        BearerToken::new(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_credentials_return_token() {
        let provider = StaticCredentials::new("abc").unwrap();
        assert_eq!(provider.access_token().await.unwrap().expose(), "abc");
        assert!(!format!("{provider:?}").contains("abc"));
    }

    #[test]
    fn static_credentials_reject_blank() {
        assert!(matches!(StaticCredentials::new(""), Err(CredentialError::Empty)));
    }

    #[tokio::test]
    async fn env_credentials_missing_variable() {
        let provider = EnvCredentials::new("FLUX_TEST_TOKEN_THAT_IS_NEVER_SET");
        let err = provider.access_token().await.unwrap_err();
        assert!(matches!(err, CredentialError::MissingEnvVar(var) if var == provider.var()));
    }

    #[test]
    fn env_credentials_default_variable() {
        assert_eq!(EnvCredentials::default().var(), ACCESS_TOKEN_VAR);
    }

    #[test]
    fn send_error_maps_to_login_send() {
        let err: AuthError = SendError::NotConnected.into();
        assert_eq!(err.to_string(), "failed to send login: not connected");
    }
}
