//! Requests, the transport seam and the request clients.

mod client;
mod method;
mod request;
mod transport;

pub(crate) use client::AUTHORIZATION;
pub use client::{
    AuthRequestClient, RequestClient, decode_body, decode_document, decode_json, service_error,
};
pub use method::Method;
pub use request::{AuthRequest, Body, Request, TokenKind};
pub use transport::{HttpRequest, HttpResponse, Transport};
