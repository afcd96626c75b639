//! Request values.

use std::collections::BTreeMap;

use crate::codec::Document;
use crate::error::{Error, InvalidInputError};

use super::Method;

/// Body of a request.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Body {
    #[default]
    Empty,
    /// Sent as canonical extended JSON.
    Document(Document),
    /// Sent verbatim.
    Raw(String),
}

/// An immutable request relative to the backend base URL.
///
/// # Example
///
/// ```
/// use stitch_core::net::{Body, Method, Request};
///
/// let request = Request::new(Method::Get, "/api/client/v2.0/auth/profile", Body::Empty).unwrap();
/// assert_eq!(request.path(), "/api/client/v2.0/auth/profile");
/// assert!(Request::new(Method::Get, "no-leading-slash", Body::Empty).is_err());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    method: Method,
    path: String,
    headers: BTreeMap<String, String>,
    body: Body,
}

impl Request {
    /// Create a request.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not absolute or contains whitespace.
    pub fn new(method: Method, path: impl Into<String>, body: Body) -> Result<Self, Error> {
        let path = path.into();
        if !path.starts_with('/') {
            return Err(InvalidInputError::Request {
                reason: format!("path '{}' must start with '/'", path),
            }
            .into());
        }
        if path.chars().any(char::is_whitespace) {
            return Err(InvalidInputError::Request {
                reason: format!("path '{}' contains whitespace", path),
            }
            .into());
        }

        Ok(Self {
            method,
            path,
            headers: BTreeMap::new(),
            body,
        })
    }

    /// Returns a copy of the request with an extra header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn body(&self) -> &Body {
        &self.body
    }
}

/// Which session token authorizes a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

/// A request that needs the current session attached.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthRequest {
    request: Request,
    token: TokenKind,
    retry_on_expired_session: bool,
}

impl AuthRequest {
    /// Authorize with the access token, refreshing and retrying once if the
    /// session turns out to be expired.
    pub fn new(request: Request) -> Self {
        Self {
            request,
            token: TokenKind::Access,
            retry_on_expired_session: true,
        }
    }

    /// Authorize with the refresh token. Never retried.
    pub fn with_refresh_token(request: Request) -> Self {
        Self {
            request,
            token: TokenKind::Refresh,
            retry_on_expired_session: false,
        }
    }

    /// Returns a copy that surfaces an expired session instead of retrying.
    pub fn without_retry(self) -> Self {
        Self {
            retry_on_expired_session: false,
            ..self
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn token(&self) -> TokenKind {
        self.token
    }

    pub fn retries_on_expired_session(&self) -> bool {
        self.retry_on_expired_session
    }
}
