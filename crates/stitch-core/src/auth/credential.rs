//! Login credentials.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, InvalidInputError};

/// The kind of auth provider a credential logs in with.
///
/// The wire tag is also the provider's default name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderType {
    #[serde(rename = "anon-user")]
    Anonymous,
    #[serde(rename = "api-key")]
    ApiKey,
    #[serde(rename = "local-userpass")]
    UserPassword,
    #[serde(rename = "custom-token")]
    CustomToken,
    #[serde(rename = "custom-function")]
    CustomFunction,
    #[serde(rename = "oauth2-google")]
    Google,
    #[serde(rename = "oauth2-facebook")]
    Facebook,
}

impl ProviderType {
    /// Returns the wire tag of the provider type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anonymous => "anon-user",
            Self::ApiKey => "api-key",
            Self::UserPassword => "local-userpass",
            Self::CustomToken => "custom-token",
            Self::CustomFunction => "custom-function",
            Self::Google => "oauth2-google",
            Self::Facebook => "oauth2-facebook",
        }
    }

    /// Returns the name a provider of this type has unless configured otherwise.
    pub fn default_name(&self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "anon-user" => Self::Anonymous,
            "api-key" => Self::ApiKey,
            "local-userpass" => Self::UserPassword,
            "custom-token" => Self::CustomToken,
            "custom-function" => Self::CustomFunction,
            "oauth2-google" => Self::Google,
            "oauth2-facebook" => Self::Facebook,
            other => {
                return Err(InvalidInputError::Other {
                    message: format!("unknown provider type '{}'", other),
                }
                .into());
            }
        })
    }
}

/// Behaviour flags of a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProviderCapabilities {
    /// Logging in again while a session of the same provider type is active
    /// returns that session instead of creating a new one.
    pub reuses_existing_session: bool,
}

/// Provider-specific login material.
#[derive(Clone, PartialEq, Eq)]
pub enum CredentialKind {
    Anonymous,
    ServerApiKey { key: String },
    UserApiKey { key: String },
    UserPassword { username: String, password: String },
    CustomToken { token: String },
    Function { payload: BTreeMap<String, String> },
    Google { auth_code: String },
    Facebook { access_token: String },
}

/// An immutable description of one way to log in.
///
/// # Security
///
/// Secrets are never exposed in Debug output.
///
/// # Example
///
/// ```
/// use stitch_core::{Credential, ProviderType};
///
/// let credential = Credential::user_password("alice@example.com", "hunter2");
/// assert_eq!(credential.provider_type(), ProviderType::UserPassword);
/// assert_eq!(credential.provider_name(), "local-userpass");
/// assert!(!format!("{:?}", credential).contains("hunter2"));
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    provider_name: String,
    kind: CredentialKind,
}

impl Credential {
    fn with_default_name(kind: CredentialKind) -> Self {
        let provider_name = Self::type_of(&kind).default_name().to_string();
        Self {
            provider_name,
            kind,
        }
    }

    /// Log in as a new anonymous user.
    pub fn anonymous() -> Self {
        Self::with_default_name(CredentialKind::Anonymous)
    }

    /// Log in with a server API key.
    pub fn server_api_key(key: impl Into<String>) -> Self {
        Self::with_default_name(CredentialKind::ServerApiKey { key: key.into() })
    }

    /// Log in with a user API key.
    pub fn user_api_key(key: impl Into<String>) -> Self {
        Self::with_default_name(CredentialKind::UserApiKey { key: key.into() })
    }

    /// Log in with a username (email) and password.
    pub fn user_password(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::with_default_name(CredentialKind::UserPassword {
            username: username.into(),
            password: password.into(),
        })
    }

    /// Log in with a JWT issued by a custom authentication system.
    pub fn custom_token(token: impl Into<String>) -> Self {
        Self::with_default_name(CredentialKind::CustomToken {
            token: token.into(),
        })
    }

    /// Log in through a backend authentication function with an arbitrary payload.
    pub fn function(payload: BTreeMap<String, String>) -> Self {
        Self::with_default_name(CredentialKind::Function { payload })
    }

    /// Log in with a Google server auth code.
    pub fn google(auth_code: impl Into<String>) -> Self {
        Self::with_default_name(CredentialKind::Google {
            auth_code: auth_code.into(),
        })
    }

    /// Log in with a Facebook access token.
    pub fn facebook(access_token: impl Into<String>) -> Self {
        Self::with_default_name(CredentialKind::Facebook {
            access_token: access_token.into(),
        })
    }

    /// Target a provider configured under a non-default name.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty or contains a `/`.
    pub fn with_provider_name(self, name: impl Into<String>) -> Result<Self, Error> {
        let name = name.into();
        if name.is_empty() || name.contains('/') {
            return Err(InvalidInputError::Other {
                message: format!("invalid provider name '{}'", name),
            }
            .into());
        }
        Ok(Self {
            provider_name: name,
            kind: self.kind,
        })
    }

    /// Returns the name of the provider this credential targets.
    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    /// Returns the provider type.
    pub fn provider_type(&self) -> ProviderType {
        Self::type_of(&self.kind)
    }

    /// Returns the provider-specific material.
    pub fn kind(&self) -> &CredentialKind {
        &self.kind
    }

    /// Returns the behaviour flags of this credential's provider.
    pub fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            reuses_existing_session: matches!(self.kind, CredentialKind::Anonymous),
        }
    }

    /// Returns the login material as sent in the login request body.
    ///
    /// # Security
    ///
    /// Use this only when constructing login requests.
    /// Never log or display this value.
    pub fn material(&self) -> BTreeMap<String, String> {
        let pairs: Vec<(&str, &str)> = match &self.kind {
            CredentialKind::Anonymous => Vec::new(),
            CredentialKind::ServerApiKey { key } | CredentialKind::UserApiKey { key } => {
                vec![("key", key.as_str())]
            }
            CredentialKind::UserPassword { username, password } => {
                vec![("username", username.as_str()), ("password", password.as_str())]
            }
            CredentialKind::CustomToken { token } => vec![("token", token.as_str())],
            CredentialKind::Function { payload } => return payload.clone(),
            CredentialKind::Google { auth_code } => vec![("authCode", auth_code.as_str())],
            CredentialKind::Facebook { access_token } => {
                vec![("accessToken", access_token.as_str())]
            }
        };
        pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn type_of(kind: &CredentialKind) -> ProviderType {
        match kind {
            CredentialKind::Anonymous => ProviderType::Anonymous,
            CredentialKind::ServerApiKey { .. } | CredentialKind::UserApiKey { .. } => {
                ProviderType::ApiKey
            }
            CredentialKind::UserPassword { .. } => ProviderType::UserPassword,
            CredentialKind::CustomToken { .. } => ProviderType::CustomToken,
            CredentialKind::Function { .. } => ProviderType::CustomFunction,
            CredentialKind::Google { .. } => ProviderType::Google,
            CredentialKind::Facebook { .. } => ProviderType::Facebook,
        }
    }
}

// Only the username is safe to show.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Credential");
        s.field("provider_type", &self.provider_type())
            .field("provider_name", &self.provider_name);
        if let CredentialKind::UserPassword { username, .. } = &self.kind {
            s.field("username", username);
        }
        if !matches!(self.kind, CredentialKind::Anonymous) {
            s.field("material", &"[REDACTED]");
        }
        s.finish()
    }
}
