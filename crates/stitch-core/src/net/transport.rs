//! The HTTP seam.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::TransportError;

use super::Method;

/// A fully resolved HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
}

/// An HTTP response with its body read to completion.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    /// Response body; empty when the backend sent none.
    pub body: String,
}

impl HttpResponse {
    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Executes HTTP requests.
///
/// Implementations report failures to reach the backend as
/// [`TransportError`]; any response that arrives, whatever its status,
/// is returned as `Ok`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}
