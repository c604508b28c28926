//! HTTP transport for manifest and asset requests
//!
//! The CDNs only serve asset files to the game's own HTTP stack, so every
//! request carries the `BestHTTP` user agent.

use bytes::Bytes;
use reqwest::{Client, ClientBuilder};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::{ProtocolError, Result};

/// User agent expected by the asset CDNs
pub const USER_AGENT: &str = "BestHTTP";

/// HTTP transport client with shared connection pool
#[derive(Clone)]
pub struct HttpClient {
    client: Arc<Client>,
}

impl HttpClient {
    /// Create a client with the default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(&HttpConfig::default())
    }

    /// Create a new HTTP client with custom configuration
    pub fn with_config(config: &HttpConfig) -> Result<Self> {
        let client = ClientBuilder::new()
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .tcp_nodelay(true)
            .tcp_keepalive(config.tcp_keepalive)
            .use_rustls_tls()
            .https_only(false)
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .redirect(reqwest::redirect::Policy::limited(3))
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self {
            client: Arc::new(client),
        })
    }

    /// Get the underlying reqwest client
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// GET `url` and return the body, mapping non-success statuses to errors
    pub async fn get_bytes(&self, url: &str) -> Result<Bytes> {
        debug!("GET {}", url);
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                ProtocolError::Timeout
            } else {
                ProtocolError::Http(e)
            }
        })?;

        let status = response.status();
        if status.is_server_error() {
            return Err(ProtocolError::ServerError(status));
        }
        if !status.is_success() {
            return Err(ProtocolError::HttpStatus(status));
        }

        Ok(response.bytes().await?)
    }

    /// GET `url` and decode the body as JSON
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let body = self.get_bytes(url).await?;
        serde_json::from_slice(&body).map_err(|e| ProtocolError::Parse(e.to_string()))
    }
}

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Connection pool idle timeout
    pub pool_idle_timeout: Duration,

    /// Maximum idle connections per host
    pub pool_max_idle_per_host: usize,

    /// Request timeout, covering the whole body of large bundles
    pub timeout: Duration,

    /// Connection timeout
    pub connect_timeout: Duration,

    /// TCP keep-alive duration
    pub tcp_keepalive: Option<Duration>,

    /// User agent header
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            pool_idle_timeout: Duration::from_secs(30),
            pool_max_idle_per_host: 16,
            timeout: Duration::from_secs(300),
            connect_timeout: Duration::from_secs(10),
            tcp_keepalive: Some(Duration::from_secs(60)),
            user_agent: USER_AGENT.to_string(),
        }
    }
}

impl HttpConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            timeout: std::env::var("ARKASSETS_REQUEST_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .map_or(defaults.timeout, Duration::from_secs),
            connect_timeout: std::env::var("ARKASSETS_CONNECT_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .map_or(defaults.connect_timeout, Duration::from_secs),
            ..defaults
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> HttpClient {
        let _ = rustls::crypto::ring::default_provider().install_default();
        HttpClient::new().expect("Test operation should succeed")
    }

    #[tokio::test]
    async fn test_get_bytes_sends_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/file.dat"))
            .and(header("user-agent", USER_AGENT))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"payload".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let body = client()
            .get_bytes(&format!("{}/file.dat", server.uri()))
            .await
            .expect("Test operation should succeed");
        assert_eq!(&body[..], b"payload");
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let client = client();
        let err = client
            .get_bytes(&format!("{}/missing", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, ProtocolError::HttpStatus(s) if s.as_u16() == 404));
        assert!(!err.should_retry());

        let err = client
            .get_bytes(&format!("{}/broken", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, ProtocolError::ServerError(s) if s.as_u16() == 502));
        assert!(err.should_retry());
    }

    #[tokio::test]
    async fn test_get_json_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/version"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client()
            .get_json::<serde_json::Value>(&format!("{}/version", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, ProtocolError::Parse(_)));
    }
}
