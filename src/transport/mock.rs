//! Scripted transport for tests
//!
//! Replies are queued per URL. The last reply for a URL is sticky: once the
//! queue is down to one entry it is returned for every further request, so
//! "always 404" is a single `MockReply`.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Notify;
use tokio::time::Instant;

use super::{HttpResponse, Transport, TransportError};

/// One scripted reply
#[derive(Debug, Clone)]
pub enum MockReply {
    Respond {
        status: u16,
        body: Value,
        gate: Option<Arc<Notify>>,
    },
    Fail(String),
}

impl MockReply {
    pub fn json(status: u16, body: Value) -> Self {
        Self::Respond {
            status,
            body,
            gate: None,
        }
    }

    pub fn status(status: u16) -> Self {
        Self::json(status, Value::Null)
    }

    pub fn connection_error(message: impl Into<String>) -> Self {
        Self::Fail(message.into())
    }

    /// Hold the reply until `gate` is notified
    pub fn gated(self, gate: Arc<Notify>) -> Self {
        match self {
            Self::Respond { status, body, .. } => Self::Respond {
                status,
                body,
                gate: Some(gate),
            },
            other => other,
        }
    }
}

/// A request seen by the mock
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: &'static str,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub at: Instant,
}

#[derive(Debug, Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<String, VecDeque<MockReply>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue replies for `url`
    pub fn on(&self, url: impl Into<String>, replies: impl IntoIterator<Item = MockReply>) -> &Self {
        let mut routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
        routes.entry(url.into()).or_default().extend(replies);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|c| c.url == url)
            .count()
    }

    fn next_reply(&self, url: &str) -> Option<MockReply> {
        let mut routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
        let queue = routes.get_mut(url)?;
        if queue.len() > 1 { queue.pop_front() } else { queue.front().cloned() }
    }

    async fn dispatch(
        &self,
        method: &'static str,
        url: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<HttpResponse, TransportError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedCall {
                method,
                url: url.to_string(),
                query: query.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
                body: body.cloned(),
                at: Instant::now(),
            });

        match self.next_reply(url) {
            Some(MockReply::Respond { status, body, gate }) => {
                if let Some(gate) = gate {
                    gate.notified().await;
                }
                Ok(HttpResponse::new(status, body))
            }
            Some(MockReply::Fail(message)) => Err(TransportError::Connection(message)),
            None => {
                log::warn!("MockTransport: no reply scripted for {} {}", method, url);
                Ok(HttpResponse::new(404, Value::Null))
            }
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<HttpResponse, TransportError> {
        self.dispatch("GET", url, query, None).await
    }

    async fn patch(&self, url: &str, body: &Value) -> Result<HttpResponse, TransportError> {
        self.dispatch("PATCH", url, &[], Some(body)).await
    }
}
