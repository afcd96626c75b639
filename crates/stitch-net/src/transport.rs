//! HTTP transport over reqwest.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use stitch_core::net::{HttpRequest, HttpResponse, Method, Transport};
use stitch_core::TransportError;
use tracing::{debug, instrument, trace};

/// [`Transport`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    timeout: Option<Duration>,
}

impl ReqwestTransport {
    /// Create a transport without a request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn new() -> Result<Self, TransportError> {
        Self::build(None)
    }

    /// Create a transport that fails requests taking longer than `timeout`.
    pub fn with_timeout(timeout: Duration) -> Result<Self, TransportError> {
        Self::build(Some(timeout))
    }

    /// Wrap an existing client.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self {
            client,
            timeout: None,
        }
    }

    fn build(timeout: Option<Duration>) -> Result<Self, TransportError> {
        let mut builder =
            reqwest::Client::builder().user_agent(concat!("stitch-rs/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| TransportError::Http {
            message: format!("failed to build HTTP client: {}", e),
        })?;
        Ok(Self { client, timeout })
    }

    fn map_error(&self, err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout {
                duration_ms: self
                    .timeout
                    .map_or(0, |t| u64::try_from(t.as_millis()).unwrap_or(u64::MAX)),
            }
        } else if err.is_connect() {
            TransportError::Connection {
                message: err.to_string(),
            }
        } else {
            TransportError::Http {
                message: err.to_string(),
            }
        }
    }
}

fn to_reqwest(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
        Method::Head => reqwest::Method::HEAD,
        Method::Options => reqwest::Method::OPTIONS,
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    #[instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        debug!("HTTP request");
        let mut builder = self
            .client
            .request(to_reqwest(request.method), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| self.map_error(e))?;
        let status = response.status().as_u16();
        trace!(status, "HTTP response");

        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response.text().await.map_err(|e| self.map_error(e))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
