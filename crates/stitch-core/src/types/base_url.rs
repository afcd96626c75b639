//! Backend base URL type.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

use crate::error::{Error, InvalidInputError};

/// A validated backend base URL.
///
/// The URL must be absolute, use HTTPS (or HTTP for localhost), and is
/// normalized so that request paths can be appended directly.
///
/// # Example
///
/// ```
/// use stitch_core::BaseUrl;
///
/// let base = BaseUrl::new("https://stitch.mongodb.com/").unwrap();
/// assert_eq!(base.url_for("/api/client/v2.0/auth/session"),
///            "https://stitch.mongodb.com/api/client/v2.0/auth/session");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BaseUrl(Url);

impl BaseUrl {
    /// The hosted backend.
    pub const DEFAULT: &'static str = "https://stitch.mongodb.com";

    /// Create a new base URL from a string, validating the format.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is not valid or doesn't meet requirements.
    pub fn new(s: impl AsRef<str>) -> Result<Self, Error> {
        let s = s.as_ref();
        let url = Url::parse(s).map_err(|e| InvalidInputError::BaseUrl {
            value: s.to_string(),
            reason: e.to_string(),
        })?;

        Self::validate(&url, s)?;

        if url.query().is_some() || url.fragment().is_some() {
            return Err(InvalidInputError::BaseUrl {
                value: s.to_string(),
                reason: "must not carry a query or fragment".to_string(),
            }
            .into());
        }

        Ok(Self(url))
    }

    /// Returns the absolute URL for a request path (which starts with `/`).
    pub fn url_for(&self, path: &str) -> String {
        let base = self.0.as_str().trim_end_matches('/');
        format!("{}{}", base, path)
    }

    /// Returns the base URL as a string.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns the host string.
    pub fn host(&self) -> Option<&str> {
        self.0.host_str()
    }

    fn validate(url: &Url, original: &str) -> Result<(), Error> {
        if url.cannot_be_a_base() {
            return Err(InvalidInputError::BaseUrl {
                value: original.to_string(),
                reason: "must be an absolute URL".to_string(),
            }
            .into());
        }

        let scheme = url.scheme();
        let is_localhost = url
            .host_str()
            .is_some_and(|h| h == "localhost" || h == "127.0.0.1" || h == "[::1]");

        if scheme != "https" && !(scheme == "http" && is_localhost) {
            return Err(InvalidInputError::BaseUrl {
                value: original.to_string(),
                reason: "must use HTTPS (HTTP allowed only for localhost)".to_string(),
            }
            .into());
        }

        if url.host_str().is_none() {
            return Err(InvalidInputError::BaseUrl {
                value: original.to_string(),
                reason: "must have a host".to_string(),
            }
            .into());
        }

        Ok(())
    }
}

impl Default for BaseUrl {
    fn default() -> Self {
        Self(Url::parse(Self::DEFAULT).expect("default base URL is valid"))
    }
}

impl fmt::Display for BaseUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str().trim_end_matches('/'))
    }
}

impl FromStr for BaseUrl {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Serialize for BaseUrl {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.0.as_str())
    }
}

impl<'de> Deserialize<'de> for BaseUrl {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        BaseUrl::new(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_https_url() {
        let base = BaseUrl::new("https://stitch.mongodb.com").unwrap();
        assert_eq!(base.host(), Some("stitch.mongodb.com"));
    }

    #[test]
    fn valid_localhost_http() {
        let base = BaseUrl::new("http://localhost:9090").unwrap();
        assert_eq!(base.host(), Some("localhost"));
        assert_eq!(
            base.url_for("/api/client/v2.0/auth/profile"),
            "http://localhost:9090/api/client/v2.0/auth/profile"
        );
    }

    #[test]
    fn url_for_ignores_trailing_slash() {
        let base = BaseUrl::new("https://stitch.mongodb.com/").unwrap();
        assert_eq!(
            base.url_for("/api/client/v2.0/auth/session"),
            "https://stitch.mongodb.com/api/client/v2.0/auth/session"
        );
        assert_eq!(base.to_string(), "https://stitch.mongodb.com");
    }

    #[test]
    fn default_is_hosted_backend() {
        assert_eq!(BaseUrl::default().to_string(), BaseUrl::DEFAULT);
    }

    #[test]
    fn invalid_http_non_localhost() {
        assert!(BaseUrl::new("http://stitch.mongodb.com").is_err());
    }

    #[test]
    fn invalid_relative_url() {
        assert!(BaseUrl::new("/api/client").is_err());
    }

    #[test]
    fn invalid_with_query() {
        assert!(BaseUrl::new("https://stitch.mongodb.com/?x=1").is_err());
    }
}
