//! Request execution against the backend.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument, trace};

use crate::codec::ejson::{self, Mode};
use crate::codec::{Document, as_document};
use crate::error::{DecodeError, Error, ServiceError, ServiceErrorCode, TransportError};
use crate::types::BaseUrl;

use super::request::{AuthRequest, Body, Request};
use super::transport::{HttpRequest, HttpResponse, Transport};

pub(crate) const AUTHORIZATION: &str = "Authorization";
const CONTENT_TYPE: &str = "Content-Type";
const ACCEPT: &str = "Accept";
const JSON: &str = "application/json";

/// Sends unauthenticated requests to the backend.
///
/// Document bodies are encoded as canonical extended JSON. Non-2xx
/// responses become [`TransportError::Service`].
#[derive(Clone)]
pub struct RequestClient {
    base_url: BaseUrl,
    transport: Arc<dyn Transport>,
}

impl RequestClient {
    /// Create a client for the given backend.
    pub fn new(base_url: BaseUrl, transport: Arc<dyn Transport>) -> Self {
        Self {
            base_url,
            transport,
        }
    }

    /// Returns the backend base URL.
    pub fn base_url(&self) -> &BaseUrl {
        &self.base_url
    }

    /// Send a request and return the successful response.
    #[instrument(skip(self, request), fields(method = %request.method(), path = request.path()))]
    pub async fn do_request(&self, request: &Request) -> Result<HttpResponse, Error> {
        let http = self.resolve(request);
        debug!("Sending request");

        let response = self.transport.execute(http).await?;
        trace!(status = response.status, "Response received");

        if response.is_success() {
            Ok(response)
        } else {
            Err(TransportError::Service(service_error(&response)).into())
        }
    }

    fn resolve(&self, request: &Request) -> HttpRequest {
        let mut headers: BTreeMap<String, String> = BTreeMap::new();
        headers.insert(ACCEPT.to_string(), JSON.to_string());

        let body = match request.body() {
            Body::Empty => None,
            Body::Document(doc) => {
                headers.insert(CONTENT_TYPE.to_string(), JSON.to_string());
                Some(ejson::stringify(&Value::Object(doc.clone())))
            }
            Body::Raw(raw) => Some(raw.clone()),
        };

        // Caller headers win over the defaults.
        headers.extend(
            request
                .headers()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );

        HttpRequest {
            method: request.method(),
            url: self.base_url.url_for(request.path()),
            headers,
            body,
        }
    }
}

impl fmt::Debug for RequestClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// Sends requests with the current session attached.
#[async_trait]
pub trait AuthRequestClient: Send + Sync {
    /// Send a request authorized by the current session.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MustAuthenticateFirst`](crate::AuthError::MustAuthenticateFirst)
    /// when logged out, and [`AuthError::InvalidSession`](crate::AuthError::InvalidSession)
    /// when the session is rejected and cannot be recovered.
    async fn do_authenticated_request(&self, request: &AuthRequest) -> Result<HttpResponse, Error>;
}

/// Build the service error for a non-2xx response.
///
/// The body is expected to be `{"error": ..., "error_code": ...}`; anything
/// else is reported with an unknown code.
pub fn service_error(response: &HttpResponse) -> ServiceError {
    let parsed = serde_json::from_str::<Value>(&response.body)
        .ok()
        .and_then(|value| as_document(value).ok());

    match parsed {
        Some(doc) => {
            let code = doc
                .get("error_code")
                .and_then(Value::as_str)
                .map(|code| {
                    let Ok(code) = code.parse::<ServiceErrorCode>();
                    code
                })
                .unwrap_or(ServiceErrorCode::Unknown(String::new()));
            let message = doc.get("error").and_then(Value::as_str).map(str::to_string);
            ServiceError::new(response.status, code, message)
        }
        None => ServiceError::new(
            response.status,
            ServiceErrorCode::Unknown(String::new()),
            Some(format!("received unexpected status code {}", response.status)),
        ),
    }
}

/// Parse a response body as relaxed extended JSON.
///
/// An empty body is `null`.
pub fn decode_body(response: &HttpResponse) -> Result<Value, DecodeError> {
    if response.body.trim().is_empty() {
        return Ok(Value::Null);
    }
    ejson::parse(&response.body, Mode::Relaxed)
}

/// Parse a response body as a document.
pub fn decode_document(response: &HttpResponse) -> Result<Document, DecodeError> {
    as_document(decode_body(response)?)
}

/// Parse a response body into `T`.
pub fn decode_json<T: DeserializeOwned>(response: &HttpResponse) -> Result<T, DecodeError> {
    Ok(serde_json::from_value(decode_body(response)?)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::Method;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<HttpRequest>>,
        reply: HttpResponse,
    }

    #[async_trait]
    impl Transport for Recorder {
        async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            self.seen.lock().unwrap().push(request);
            Ok(self.reply.clone())
        }
    }

    fn client(reply: HttpResponse) -> (RequestClient, Arc<Recorder>) {
        let recorder = Arc::new(Recorder {
            seen: Mutex::default(),
            reply,
        });
        let base = BaseUrl::new("https://stitch.example.com/").unwrap();
        (RequestClient::new(base, recorder.clone()), recorder)
    }

    #[tokio::test]
    async fn documents_are_sent_as_canonical_extended_json() {
        let (client, recorder) = client(HttpResponse {
            status: 200,
            ..Default::default()
        });
        let body = as_document(json!({ "n": 42 })).unwrap();
        let request = Request::new(Method::Post, "/api/x", Body::Document(body)).unwrap();

        client.do_request(&request).await.unwrap();

        let seen = recorder.seen.lock().unwrap();
        assert_eq!(seen[0].url, "https://stitch.example.com/api/x");
        assert_eq!(seen[0].body.as_deref(), Some(r#"{"n":{"$numberInt":"42"}}"#));
        assert_eq!(seen[0].headers["Content-Type"], "application/json");
    }

    #[tokio::test]
    async fn error_responses_carry_the_backend_code() {
        let (client, _) = client(HttpResponse {
            status: 401,
            body: r#"{"error":"invalid session","error_code":"InvalidSession"}"#.to_string(),
            ..Default::default()
        });
        let request = Request::new(Method::Get, "/api/x", Body::Empty).unwrap();

        let err = client.do_request(&request).await.unwrap_err();
        assert!(err.is_invalid_session());
    }

    #[test]
    fn bare_401_is_not_an_invalid_session() {
        let error = service_error(&HttpResponse {
            status: 401,
            body: "Unauthorized".to_string(),
            ..Default::default()
        });
        assert!(!error.is_invalid_session());
        assert_eq!(error.code, ServiceErrorCode::Unknown(String::new()));
    }

    #[test]
    fn unknown_codes_are_preserved() {
        let error = service_error(&HttpResponse {
            status: 400,
            body: r#"{"error":"nope","error_code":"SomethingNew"}"#.to_string(),
            ..Default::default()
        });
        assert_eq!(error.code, ServiceErrorCode::Unknown("SomethingNew".to_string()));
        assert_eq!(error.message.as_deref(), Some("nope"));
    }

    #[test]
    fn bodies_decode_relaxed() {
        let response = HttpResponse {
            status: 200,
            body: r#"{"count":{"$numberLong":"7"}}"#.to_string(),
            ..Default::default()
        };
        let value: Value = decode_json(&response).unwrap();
        assert_eq!(value, json!({ "count": 7 }));

        let empty = HttpResponse {
            status: 204,
            ..Default::default()
        };
        assert_eq!(decode_body(&empty).unwrap(), Value::Null);
    }
}
