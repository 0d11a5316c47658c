//! HTTP transport abstraction for the model backends.
//!
//! Providers only ever POST JSON and read back a status plus body, so the
//! trait is exactly that. Transport failures are pre-classified (timeout,
//! connection, other) because each backend maps them to different
//! user-facing causes. Mock transports slot in for tests.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HttpError {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("transport error: {0}")]
    Other(String),
}

/// Sends a POST request with a JSON body and returns the raw response.
///
/// Non-success HTTP statuses are NOT errors at this layer; backends decide
/// what each status means.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn post_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &serde_json::Value,
    ) -> Result<HttpResponse, HttpError>;
}

/// Production transport backed by reqwest, with a fixed per-call timeout.
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &serde_json::Value,
    ) -> Result<HttpResponse, HttpError> {
        let mut request = self.client.post(url);
        for (key, value) in headers {
            request = request.header(*key, *value);
        }

        let response = request.json(body).send().await.map_err(classify)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(classify)?;
        Ok(HttpResponse { status, body })
    }
}

fn classify(err: reqwest::Error) -> HttpError {
    if err.is_timeout() {
        HttpError::Timeout
    } else if err.is_connect() {
        HttpError::Connect(err.to_string())
    } else {
        HttpError::Other(err.to_string())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::{Arc, Mutex};

    pub type RequestLog = Arc<Mutex<Vec<(String, serde_json::Value)>>>;

    /// Transport returning a canned result, recording every request.
    pub struct MockTransport {
        result: Result<HttpResponse, HttpError>,
        requests: RequestLog,
    }

    impl MockTransport {
        pub fn responding(status: u16, body: &str) -> Self {
            Self {
                result: Ok(HttpResponse {
                    status,
                    body: body.to_string(),
                }),
                requests: RequestLog::default(),
            }
        }

        pub fn failing(error: HttpError) -> Self {
            Self {
                result: Err(error),
                requests: RequestLog::default(),
            }
        }

        /// Shared handle on the request log, usable after the transport
        /// has been boxed away into a provider.
        pub fn request_log(&self) -> RequestLog {
            Arc::clone(&self.requests)
        }
    }

    #[async_trait]
    impl HttpTransport for MockTransport {
        async fn post_json(
            &self,
            url: &str,
            _headers: &[(&str, &str)],
            body: &serde_json::Value,
        ) -> Result<HttpResponse, HttpError> {
            self.requests
                .lock()
                .unwrap()
                .push((url.to_string(), body.clone()));
            self.result.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::MockTransport;
    use super::*;

    #[tokio::test]
    async fn test_mock_transport_returns_response() {
        let transport = MockTransport::responding(200, "{\"ok\":true}");
        let log = transport.request_log();
        let response = transport
            .post_json("http://example.test", &[], &serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, "{\"ok\":true}");
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_mock_transport_propagates_error() {
        let transport = MockTransport::failing(HttpError::Timeout);
        let err = transport
            .post_json("http://example.test", &[], &serde_json::json!({}))
            .await
            .unwrap_err();
        assert_eq!(err, HttpError::Timeout);
    }
}
