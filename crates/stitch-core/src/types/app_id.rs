//! Client application identifier.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, InvalidInputError};

/// A validated client app id (e.g. `todo-app-abcde`).
///
/// App ids are embedded in route paths and storage keys, so they must be
/// non-empty and limited to URL-safe characters.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AppId(String);

impl AppId {
    /// Create a new app id, validating the format.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is empty or contains characters other than
    /// ASCII letters, digits, `-`, `_` and `.`.
    pub fn new(s: impl Into<String>) -> Result<Self, Error> {
        let s = s.into();
        Self::validate(&s)?;
        Ok(Self(s))
    }

    /// Returns the app id string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(s: &str) -> Result<(), Error> {
        if s.is_empty() {
            return Err(InvalidInputError::AppId {
                value: s.to_string(),
                reason: "must be a non-empty string".to_string(),
            }
            .into());
        }

        if let Some(c) = s
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        {
            return Err(InvalidInputError::AppId {
                value: s.to_string(),
                reason: format!("contains invalid character '{}'", c),
            }
            .into());
        }

        Ok(())
    }
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Hashes and compares like the inner string, so maps keyed by `AppId`
// can be queried with a `&str`.
impl Borrow<str> for AppId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl FromStr for AppId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for AppId {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<AppId> for String {
    fn from(id: AppId) -> Self {
        id.0
    }
}

impl AsRef<str> for AppId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
