//! Error types for the stitch client.
//!
//! This module provides a unified error type with explicit variants for
//! authentication, transport, decoding, storage, and input validation errors.
//! Every error is `Clone` so that a single refresh outcome can be handed to
//! every caller waiting on it.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The unified error type for stitch operations.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Authentication state errors (no session, invalid session, provider conflicts).
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Network transport or backend errors.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A response or stored document did not have the expected shape.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Persistent storage failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Input validation errors (base URL, app id, request shape).
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InvalidInputError),
}

impl Error {
    /// Returns true if this error means the session is no longer usable.
    ///
    /// This is the case both for the local [`AuthError::InvalidSession`] and for a
    /// backend response carrying the `InvalidSession` error code.
    pub fn is_invalid_session(&self) -> bool {
        match self {
            Error::Auth(AuthError::InvalidSession) => true,
            Error::Transport(TransportError::Service(err)) => err.is_invalid_session(),
            _ => false,
        }
    }

    /// Returns the backend error code, if this error came from the backend.
    pub fn service_error_code(&self) -> Option<&ServiceErrorCode> {
        match self {
            Error::Transport(TransportError::Service(err)) => Some(&err.code),
            _ => None,
        }
    }
}

/// Authentication-related errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The session was rejected by the backend, or there is no refresh token.
    #[error("invalid session")]
    InvalidSession,

    /// An authenticated operation was attempted while logged out.
    #[error("must authenticate first")]
    MustAuthenticateFirst,

    /// A login was attempted with a provider other than the active one.
    #[error("already logged in with provider '{active}', cannot log in with '{requested}'")]
    LoginWithDifferentProvider { active: String, requested: String },

    /// The backend does not know the user.
    #[error("user not found")]
    UserNotFound,
}

/// Transport-level errors.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Network connection failed.
    #[error("connection failed: {message}")]
    Connection { message: String },

    /// Request timed out.
    #[error("request timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Generic HTTP error.
    #[error("HTTP error: {message}")]
    Http { message: String },

    /// The backend answered with a non-success status.
    #[error("{0}")]
    Service(ServiceError),
}

/// An error response returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceError {
    /// HTTP status code.
    pub status: u16,
    /// Backend error code (from the `error_code` field).
    pub code: ServiceErrorCode,
    /// Error message from the backend (from the `error` field).
    pub message: Option<String>,
}

impl ServiceError {
    /// Create a new service error.
    pub fn new(status: u16, code: ServiceErrorCode, message: Option<String>) -> Self {
        Self {
            status,
            code,
            message,
        }
    }

    /// Check whether the backend reported an expired or invalid session.
    ///
    /// Only the `InvalidSession` error code counts; a bare 401 is not enough.
    pub fn is_invalid_session(&self) -> bool {
        self.code == ServiceErrorCode::InvalidSession
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {} [{}]", self.status, self.code)?;
        if let Some(ref message) = self.message {
            write!(f, ": {}", message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ServiceError {}

/// Error codes reported by the backend in the `error_code` response field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ServiceErrorCode {
    MissingAuthReq,
    InvalidSession,
    UserAppDomainMismatch,
    DomainNotAllowed,
    ReadSizeLimitExceeded,
    InvalidParameter,
    MissingParameter,
    ArgumentsNotAllowed,
    FunctionExecutionError,
    FunctionNotFound,
    NoMatchingRuleFound,
    InternalServerError,
    AuthProviderNotFound,
    ServiceNotFound,
    ServiceCommandNotFound,
    UserNotFound,
    UserDisabled,
    InvalidPassword,
    ExecutionTimeLimitExceeded,
    /// A code this client does not know about, or no code at all (empty).
    Unknown(String),
}

impl ServiceErrorCode {
    /// Returns the wire representation of the code.
    pub fn as_str(&self) -> &str {
        match self {
            Self::MissingAuthReq => "MissingAuthReq",
            Self::InvalidSession => "InvalidSession",
            Self::UserAppDomainMismatch => "UserAppDomainMismatch",
            Self::DomainNotAllowed => "DomainNotAllowed",
            Self::ReadSizeLimitExceeded => "ReadSizeLimitExceeded",
            Self::InvalidParameter => "InvalidParameter",
            Self::MissingParameter => "MissingParameter",
            Self::ArgumentsNotAllowed => "ArgumentsNotAllowed",
            Self::FunctionExecutionError => "FunctionExecutionError",
            Self::FunctionNotFound => "FunctionNotFound",
            Self::NoMatchingRuleFound => "NoMatchingRuleFound",
            Self::InternalServerError => "InternalServerError",
            Self::AuthProviderNotFound => "AuthProviderNotFound",
            Self::ServiceNotFound => "ServiceNotFound",
            Self::ServiceCommandNotFound => "ServiceCommandNotFound",
            Self::UserNotFound => "UserNotFound",
            Self::UserDisabled => "UserDisabled",
            Self::InvalidPassword => "InvalidPassword",
            Self::ExecutionTimeLimitExceeded => "ExecutionTimeLimitExceeded",
            Self::Unknown(code) => code,
        }
    }
}

impl FromStr for ServiceErrorCode {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "MissingAuthReq" => Self::MissingAuthReq,
            "InvalidSession" => Self::InvalidSession,
            "UserAppDomainMismatch" => Self::UserAppDomainMismatch,
            "DomainNotAllowed" => Self::DomainNotAllowed,
            "ReadSizeLimitExceeded" => Self::ReadSizeLimitExceeded,
            "InvalidParameter" => Self::InvalidParameter,
            "MissingParameter" => Self::MissingParameter,
            "ArgumentsNotAllowed" => Self::ArgumentsNotAllowed,
            "FunctionExecutionError" => Self::FunctionExecutionError,
            "FunctionNotFound" => Self::FunctionNotFound,
            "NoMatchingRuleFound" => Self::NoMatchingRuleFound,
            "InternalServerError" => Self::InternalServerError,
            "AuthProviderNotFound" => Self::AuthProviderNotFound,
            "ServiceNotFound" => Self::ServiceNotFound,
            "ServiceCommandNotFound" => Self::ServiceCommandNotFound,
            "UserNotFound" => Self::UserNotFound,
            "UserDisabled" => Self::UserDisabled,
            "InvalidPassword" => Self::InvalidPassword,
            "ExecutionTimeLimitExceeded" => Self::ExecutionTimeLimitExceeded,
            other => Self::Unknown(other.to_string()),
        })
    }
}

impl fmt::Display for ServiceErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(code) if code.is_empty() => f.write_str("Unknown"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// A document did not match the expected wire shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// A required field was absent.
    #[error("missing required field '{field}'")]
    MissingField { field: String },

    /// A field was present with the wrong JSON type.
    #[error("field '{field}' must be {expected}")]
    WrongType {
        field: String,
        expected: &'static str,
    },

    /// An extended JSON wrapper could not be interpreted.
    #[error("invalid extended JSON: {message}")]
    ExtendedJson { message: String },

    /// The body was not valid JSON or did not fit the target type.
    #[error("malformed body: {message}")]
    Malformed { message: String },
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        DecodeError::Malformed {
            message: err.to_string(),
        }
    }
}

/// Persistent storage errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// Reading a key failed.
    #[error("failed to read '{key}': {message}")]
    Read { key: String, message: String },

    /// Writing a key failed.
    #[error("failed to write '{key}': {message}")]
    Write { key: String, message: String },

    /// Removing a key failed.
    #[error("failed to remove '{key}': {message}")]
    Remove { key: String, message: String },

    /// The stored record exists but cannot be interpreted.
    #[error("stored record '{key}' is corrupt: {message}")]
    Corrupt { key: String, message: String },
}

/// Input validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidInputError {
    /// Invalid base URL.
    #[error("invalid base URL '{value}': {reason}")]
    BaseUrl { value: String, reason: String },

    /// Invalid client app id.
    #[error("invalid app id '{value}': {reason}")]
    AppId { value: String, reason: String },

    /// Invalid request construction.
    #[error("invalid request: {reason}")]
    Request { reason: String },

    /// Registry misuse (duplicate or missing client).
    #[error("{message}")]
    Registry { message: String },

    /// Generic invalid input.
    #[error("invalid input: {message}")]
    Other { message: String },
}
