//! Session token types.

use std::fmt;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::Deserialize;

use crate::error::DecodeError;

/// The claims of an access token this client cares about.
///
/// Derived from the token string whenever it changes; never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedJwt {
    /// Expiry, seconds since the Unix epoch.
    pub expires: i64,
    /// Issue time, seconds since the Unix epoch.
    pub issued_at: Option<i64>,
}

#[derive(Deserialize)]
struct Claims {
    exp: i64,
    #[serde(default)]
    iat: Option<i64>,
}

impl DecodedJwt {
    /// Decode the claims of a JWT without verifying its signature.
    ///
    /// # Errors
    ///
    /// Returns an error if the token does not have three segments or the
    /// payload is not base64url-encoded JSON with an `exp` claim.
    pub fn decode(token: &str) -> Result<Self, DecodeError> {
        let mut parts = token.split('.');
        let (Some(_), Some(payload), Some(_), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(DecodeError::Malformed {
                message: "JWT must have three segments".to_string(),
            });
        };

        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|e| DecodeError::Malformed {
                message: format!("JWT payload: {}", e),
            })?;
        let claims: Claims = serde_json::from_slice(&bytes)?;

        Ok(Self {
            expires: claims.exp,
            issued_at: claims.iat,
        })
    }

    /// Returns the expiry as a timestamp.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.expires, 0).single()
    }

    /// Check whether the token expires within `window` of `now`.
    pub fn expires_within(&self, window: Duration, now: DateTime<Utc>) -> bool {
        self.expires <= (now + window).timestamp()
    }
}

/// An access token attached to ordinary authenticated requests.
///
/// # Security
///
/// Never logged or displayed in Debug output.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    raw: String,
    decoded: Option<DecodedJwt>,
}

impl AccessToken {
    /// Create a new access token, decoding its expiry if it is a JWT.
    pub fn new(token: impl Into<String>) -> Self {
        let raw = token.into();
        let decoded = DecodedJwt::decode(&raw).ok();
        Self { raw, decoded }
    }

    /// Returns the token value for use in authorization headers.
    ///
    /// # Security
    ///
    /// Use only when constructing HTTP authorization headers or persisting
    /// the session.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns the decoded claims, if the token is a well-formed JWT.
    pub fn decoded(&self) -> Option<&DecodedJwt> {
        self.decoded.as_ref()
    }

    /// Check whether the token is known to expire within `window`.
    ///
    /// Tokens without a readable expiry are never considered expiring.
    pub fn expires_within(&self, window: Duration) -> bool {
        self.decoded
            .is_some_and(|jwt| jwt.expires_within(window, Utc::now()))
    }
}

// Hide token value in Debug output
impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AccessToken").field(&"[REDACTED]").finish()
    }
}

/// A refresh token used only to obtain new access tokens and end sessions.
///
/// # Security
///
/// Never logged or displayed in Debug output.
#[derive(Clone, PartialEq, Eq)]
pub struct RefreshToken(String);

impl RefreshToken {
    /// Create a new refresh token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the token value for use in refresh requests.
    ///
    /// # Security
    ///
    /// Use only when constructing token refresh requests or persisting the session.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Hide token value in Debug output
impl fmt::Debug for RefreshToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RefreshToken").field(&"[REDACTED]").finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Build an unsigned JWT with the given claims.
    pub(crate) fn jwt(exp: i64) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{},"iat":1000,"sub":"u"}}"#, exp));
        format!("{}.{}.signature", header, payload)
    }

    #[test]
    fn access_token_hides_value_in_debug() {
        let token = AccessToken::new("eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9...");
        let debug = format!("{:?}", token);
        assert!(!debug.contains("eyJ"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn refresh_token_hides_value_in_debug() {
        let token = RefreshToken::new("refresh_token_value_here");
        let debug = format!("{:?}", token);
        assert!(!debug.contains("refresh_token"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn decodes_expiry_claims() {
        let decoded = DecodedJwt::decode(&jwt(2_000_000_000)).unwrap();
        assert_eq!(decoded.expires, 2_000_000_000);
        assert_eq!(decoded.issued_at, Some(1000));
    }

    #[test]
    fn opaque_tokens_have_no_expiry() {
        let token = AccessToken::new("not-a-jwt");
        assert!(token.decoded().is_none());
        assert!(!token.expires_within(Duration::seconds(10)));
    }

    #[test]
    fn expiring_tokens_are_detected() {
        let soon = AccessToken::new(jwt(Utc::now().timestamp() + 5));
        let later = AccessToken::new(jwt(Utc::now().timestamp() + 3600));
        assert!(soon.expires_within(Duration::seconds(10)));
        assert!(!later.expires_within(Duration::seconds(10)));
    }

    #[test]
    fn malformed_jwts_are_rejected() {
        assert!(DecodedJwt::decode("a.b").is_err());
        assert!(DecodedJwt::decode("a.!!!.c").is_err());
    }
}
