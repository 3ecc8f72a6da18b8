//! Gateway Resolution
//!
//! Locates the WebSocket gateway before each dial by querying the platform
//! config endpoint.
//!
//! # Config Endpoint
//!
//! `GET <config_url>` answers
//! `{"apiUrl": ..., "mobileGatewayUrl": {"livetrading": ..., "papermoney": ...}, "authUrl": ...}`.

use async_trait::async_trait;
use reqwest::StatusCode;

use super::messages::GatewayConfigResponse;
use crate::application::ports::{GatewayError, GatewayResolver};
use crate::infrastructure::config::Environment;

/// Resolver backed by the HTTP config endpoint.
#[derive(Debug, Clone)]
pub struct HttpGatewayResolver {
    client: reqwest::Client,
    config_url: String,
    environment: Environment,
}

impl HttpGatewayResolver {
    /// Create a resolver for `environment`.
    #[must_use]
    pub fn new(config_url: impl Into<String>, environment: Environment) -> Self {
        Self::with_client(reqwest::Client::new(), config_url, environment)
    }

    /// Create a resolver that reuses an existing HTTP client.
    #[must_use]
    pub fn with_client(
        client: reqwest::Client,
        config_url: impl Into<String>,
        environment: Environment,
    ) -> Self {
        Self {
            client,
            config_url: config_url.into(),
            environment,
        }
    }

    fn select(&self, response: GatewayConfigResponse) -> Result<String, GatewayError> {
        let url = match self.environment {
            Environment::Live => response.mobile_gateway_url.livetrading,
            Environment::Paper => response.mobile_gateway_url.papermoney,
        };
        if url.trim().is_empty() {
            return Err(GatewayError::EmptyUrl(self.environment.as_str().to_string()));
        }
        Ok(url)
    }
}

#[async_trait]
impl GatewayResolver for HttpGatewayResolver {
    async fn resolve(&self) -> Result<String, GatewayError> {
        tracing::debug!(url = %self.config_url, environment = self.environment.as_str(), "Resolving gateway");

        let response = self.client.get(&self.config_url).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(GatewayError::Status(status.as_u16()));
        }

        let body: GatewayConfigResponse = response.json().await?;
        let url = self.select(body)?;
        tracing::debug!(gateway = %url, "Gateway resolved");
        Ok(url)
    }
}

/// Resolver that always returns the same URL.
#[derive(Debug, Clone)]
pub struct StaticGatewayResolver {
    url: String,
}

impl StaticGatewayResolver {
    /// Resolve to `url`.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl GatewayResolver for StaticGatewayResolver {
    async fn resolve(&self) -> Result<String, GatewayError> {
        Ok(self.url.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn server_with(response: ResponseTemplate) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/api/config"))
            .respond_with(response)
            .mount(&server)
            .await;
        server
    }

    fn config_body() -> serde_json::Value {
        json!({
            "apiUrl": "https://api.example",
            "mobileGatewayUrl": {"livetrading": "wss://live.example/ws", "papermoney": "wss://paper.example/ws"},
            "authUrl": "https://auth.example"
        })
    }

    #[tokio::test]
    async fn resolves_live_url() {
        let server = server_with(ResponseTemplate::new(200).set_body_json(config_body())).await;
        let resolver = HttpGatewayResolver::new(
            format!("{}/v1/api/config", server.uri()),
            Environment::Live,
        );
        assert_eq!(resolver.resolve().await.unwrap(), "wss://live.example/ws");
    }

    #[tokio::test]
    async fn resolves_paper_url() {
        let server = server_with(ResponseTemplate::new(200).set_body_json(config_body())).await;
        let resolver = HttpGatewayResolver::new(
            format!("{}/v1/api/config", server.uri()),
            Environment::Paper,
        );
        assert_eq!(resolver.resolve().await.unwrap(), "wss://paper.example/ws");
    }

    #[tokio::test]
    async fn non_ok_status_is_error() {
        let server = server_with(ResponseTemplate::new(503)).await;
        let resolver = HttpGatewayResolver::new(
            format!("{}/v1/api/config", server.uri()),
            Environment::Live,
        );
        assert!(matches!(resolver.resolve().await, Err(GatewayError::Status(503))));
    }

    #[tokio::test]
    async fn empty_url_is_error() {
        let server = server_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"mobileGatewayUrl": {"livetrading": "wss://live"}})),
        )
        .await;
        let resolver = HttpGatewayResolver::new(
            format!("{}/v1/api/config", server.uri()),
            Environment::Paper,
        );
        assert!(matches!(resolver.resolve().await, Err(GatewayError::EmptyUrl(env)) if env == "paper"));
    }

    #[tokio::test]
    async fn malformed_body_is_invalid_response() {
        let server = server_with(ResponseTemplate::new(200).set_body_string("<html>")).await;
        let resolver = HttpGatewayResolver::new(
            format!("{}/v1/api/config", server.uri()),
            Environment::Live,
        );
        assert!(matches!(resolver.resolve().await, Err(GatewayError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn static_resolver_returns_url() {
        let resolver = StaticGatewayResolver::new("ws://127.0.0.1:9000");
        assert_eq!(resolver.resolve().await.unwrap(), "ws://127.0.0.1:9000");
    }
}
