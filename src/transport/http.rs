//! reqwest-backed transport

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;

use super::{HttpResponse, Transport, TransportError};

/// Default request timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for the HTTP transport
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            user_agent: format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpTransportConfig {
    /// Create a config with a specific timeout
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Default::default()
        }
    }
}

/// Transport over a shared reqwest client
pub struct HttpTransport {
    client: Client,
    config: HttpTransportConfig,
}

impl HttpTransport {
    pub fn new(config: HttpTransportConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self { client, config })
    }

    async fn send(&self, request: RequestBuilder) -> Result<HttpResponse, TransportError> {
        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await.map_err(map_reqwest_error)?;

        // 404s and 5xx pages are often HTML or empty; only the status matters then
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        log::debug!("HTTP {} ({} bytes)", status, bytes.len());
        Ok(HttpResponse { status, body })
    }
}

fn map_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Network(e)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<HttpResponse, TransportError> {
        log::debug!("GET {}", url);
        let mut request = self.client.get(url);
        if !query.is_empty() {
            request = request.query(query);
        }
        self.send(request).await
    }

    async fn patch(&self, url: &str, body: &Value) -> Result<HttpResponse, TransportError> {
        log::debug!("PATCH {}", url);
        self.send(self.client.patch(url).json(body)).await
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("timeout", &self.config.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport() -> HttpTransport {
        HttpTransport::new(HttpTransportConfig::default()).unwrap()
    }

    #[test]
    fn test_config_default() {
        let config = HttpTransportConfig::default();
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert!(config.user_agent.starts_with("authoring/"));
    }

    #[test]
    fn test_config_with_timeout() {
        let config = HttpTransportConfig::with_timeout(Duration::from_secs(5));
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert!(HttpTransport::new(config).is_ok());
    }

    #[tokio::test]
    async fn test_get_decodes_json_and_sends_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/courses/v1/courses/c1"))
            .and(query_param("username", "staff"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "c1", "name": "Test"})))
            .expect(1)
            .mount(&server)
            .await;

        let url = format!("{}/api/courses/v1/courses/c1", server.uri());
        let response = transport().get(&url, &[("username", "staff")]).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.body["name"], "Test");
    }

    #[tokio::test]
    async fn test_get_non_json_body_is_null() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("<html>not found</html>"))
            .mount(&server)
            .await;

        let response = transport().get(&server.uri(), &[]).await.unwrap();

        assert_eq!(response.status, 404);
        assert_eq!(response.body, Value::Null);
    }

    #[tokio::test]
    async fn test_patch_sends_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/api/course_apps/v1/apps/c1"))
            .and(body_json(json!({"id": "teams", "enabled": true})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "teams", "enabled": true})))
            .expect(1)
            .mount(&server)
            .await;

        let url = format!("{}/api/course_apps/v1/apps/c1", server.uri());
        let response = transport()
            .patch(&url, &json!({"id": "teams", "enabled": true}))
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.body["enabled"], true);
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        // Nothing listens on port 9 on the loopback interface
        let result = transport().get("http://127.0.0.1:9/", &[]).await;
        assert!(matches!(result, Err(TransportError::Network(_))));
    }

    #[test]
    fn test_debug_impl() {
        let debug_str = format!("{:?}", transport());
        assert!(debug_str.contains("HttpTransport"));
    }
}
