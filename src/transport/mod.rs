//! HTTP transport seam
//!
//! The fetch core never talks to reqwest directly. Everything goes through the
//! [`Transport`] trait so tests can script server behaviour with
//! [`MockTransport`].

pub mod http;
pub mod mock;

use async_trait::async_trait;
use serde_json::Value;

pub use http::{HttpTransport, HttpTransportConfig};
pub use mock::{MockReply, MockTransport, RecordedCall};

/// A decoded HTTP response: status code plus JSON body (`Null` when empty or not JSON)
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Value,
}

impl HttpResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }
}

/// Errors below the HTTP status line: the request never produced a response
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Request timed out")]
    Timeout,
}

/// Minimal HTTP surface used by the API layer
#[async_trait]
pub trait Transport: Send + Sync {
    /// GET `url` with the given query pairs
    async fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<HttpResponse, TransportError>;

    /// PATCH `url` with a JSON body
    async fn patch(&self, url: &str, body: &Value) -> Result<HttpResponse, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_display() {
        assert_eq!(TransportError::Timeout.to_string(), "Request timed out");
        assert_eq!(
            TransportError::Connection("reset by peer".into()).to_string(),
            "Connection error: reset by peer"
        );
    }
}
