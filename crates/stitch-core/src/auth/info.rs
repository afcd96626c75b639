//! Session records and their codecs.

use serde_json::Value;

use crate::codec::{Codec, Document, optional_str, required_str};
use crate::error::DecodeError;

use super::credential::ProviderType;
use super::tokens::{AccessToken, RefreshToken};

/// One authenticated session.
///
/// Every field is always present; "logged out" is the absence of an
/// `AuthInfo`, never a partially filled one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthInfo {
    pub user_id: String,
    pub device_id: String,
    pub access_token: AccessToken,
    pub refresh_token: RefreshToken,
    pub logged_in_provider_type: ProviderType,
    pub logged_in_provider_name: String,
}

impl AuthInfo {
    /// Apply a refresh response, replacing the access token and any
    /// identity fields the backend rotated.
    pub fn refreshed(&self, response: RefreshResponse) -> AuthInfo {
        AuthInfo {
            user_id: response.user_id.unwrap_or_else(|| self.user_id.clone()),
            device_id: response.device_id.unwrap_or_else(|| self.device_id.clone()),
            access_token: response.access_token,
            refresh_token: response
                .refresh_token
                .unwrap_or_else(|| self.refresh_token.clone()),
            logged_in_provider_type: self.logged_in_provider_type,
            logged_in_provider_name: self.logged_in_provider_name.clone(),
        }
    }
}

/// Key names of the [`AuthInfo`] fields in one document layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldNames {
    pub user_id: &'static str,
    pub device_id: &'static str,
    pub access_token: &'static str,
    pub refresh_token: &'static str,
    pub provider_type: &'static str,
    pub provider_name: &'static str,
}

impl FieldNames {
    /// camelCase layout of the persisted record.
    pub const STORE: FieldNames = FieldNames {
        user_id: "userId",
        device_id: "deviceId",
        access_token: "accessToken",
        refresh_token: "refreshToken",
        provider_type: "loggedInProviderType",
        provider_name: "loggedInProviderName",
    };

    /// snake_case layout used by the backend and by legacy records.
    pub const WIRE: FieldNames = FieldNames {
        user_id: "user_id",
        device_id: "device_id",
        access_token: "access_token",
        refresh_token: "refresh_token",
        provider_type: "provider_type",
        provider_name: "provider_name",
    };
}

/// Codec for a full [`AuthInfo`] in a given field layout.
#[derive(Debug, Clone, Copy)]
pub struct AuthInfoCodec {
    fields: FieldNames,
}

impl AuthInfoCodec {
    /// Codec for the given layout.
    pub const fn new(fields: FieldNames) -> Self {
        Self { fields }
    }
}

impl Codec<AuthInfo> for AuthInfoCodec {
    fn encode(&self, info: &AuthInfo) -> Document {
        let f = &self.fields;
        let mut doc = Document::new();
        doc.insert(f.user_id.into(), info.user_id.clone().into());
        doc.insert(f.device_id.into(), info.device_id.clone().into());
        doc.insert(f.access_token.into(), info.access_token.as_str().into());
        doc.insert(f.refresh_token.into(), info.refresh_token.as_str().into());
        doc.insert(
            f.provider_type.into(),
            info.logged_in_provider_type.as_str().into(),
        );
        doc.insert(
            f.provider_name.into(),
            info.logged_in_provider_name.clone().into(),
        );
        doc
    }

    fn decode(&self, doc: &Document) -> Result<AuthInfo, DecodeError> {
        let f = &self.fields;
        let provider_type = required_str(doc, f.provider_type)?;
        let logged_in_provider_type =
            provider_type
                .parse::<ProviderType>()
                .map_err(|_| DecodeError::WrongType {
                    field: f.provider_type.to_string(),
                    expected: "a known provider type",
                })?;

        Ok(AuthInfo {
            user_id: required_str(doc, f.user_id)?,
            device_id: required_str(doc, f.device_id)?,
            access_token: AccessToken::new(required_str(doc, f.access_token)?),
            refresh_token: RefreshToken::new(required_str(doc, f.refresh_token)?),
            logged_in_provider_type,
            logged_in_provider_name: required_str(doc, f.provider_name)?,
        })
    }
}

/// Body of a successful login response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginResponse {
    pub user_id: String,
    pub device_id: String,
    pub access_token: AccessToken,
    pub refresh_token: RefreshToken,
}

impl LoginResponse {
    /// Combine with the provider that was logged in with.
    pub fn into_auth_info(self, provider_type: ProviderType, provider_name: &str) -> AuthInfo {
        AuthInfo {
            user_id: self.user_id,
            device_id: self.device_id,
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            logged_in_provider_type: provider_type,
            logged_in_provider_name: provider_name.to_string(),
        }
    }
}

/// Codec for [`LoginResponse`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LoginResponseCodec;

impl Codec<LoginResponse> for LoginResponseCodec {
    fn encode(&self, response: &LoginResponse) -> Document {
        let f = FieldNames::WIRE;
        let mut doc = Document::new();
        doc.insert(f.user_id.into(), response.user_id.clone().into());
        doc.insert(f.device_id.into(), response.device_id.clone().into());
        doc.insert(f.access_token.into(), response.access_token.as_str().into());
        doc.insert(f.refresh_token.into(), response.refresh_token.as_str().into());
        doc
    }

    fn decode(&self, doc: &Document) -> Result<LoginResponse, DecodeError> {
        let f = FieldNames::WIRE;
        Ok(LoginResponse {
            user_id: required_str(doc, f.user_id)?,
            device_id: required_str(doc, f.device_id)?,
            access_token: AccessToken::new(required_str(doc, f.access_token)?),
            refresh_token: RefreshToken::new(required_str(doc, f.refresh_token)?),
        })
    }
}

/// Body of a successful refresh response.
///
/// Only the access token is guaranteed; the rest is present when the
/// backend rotates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshResponse {
    pub access_token: AccessToken,
    pub refresh_token: Option<RefreshToken>,
    pub user_id: Option<String>,
    pub device_id: Option<String>,
}

/// Codec for [`RefreshResponse`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RefreshResponseCodec;

impl Codec<RefreshResponse> for RefreshResponseCodec {
    fn encode(&self, response: &RefreshResponse) -> Document {
        let f = FieldNames::WIRE;
        let mut doc = Document::new();
        doc.insert(f.access_token.into(), response.access_token.as_str().into());
        if let Some(ref token) = response.refresh_token {
            doc.insert(f.refresh_token.into(), token.as_str().into());
        }
        if let Some(ref user_id) = response.user_id {
            doc.insert(f.user_id.into(), Value::from(user_id.as_str()));
        }
        if let Some(ref device_id) = response.device_id {
            doc.insert(f.device_id.into(), Value::from(device_id.as_str()));
        }
        doc
    }

    fn decode(&self, doc: &Document) -> Result<RefreshResponse, DecodeError> {
        let f = FieldNames::WIRE;
        Ok(RefreshResponse {
            access_token: AccessToken::new(required_str(doc, f.access_token)?),
            refresh_token: optional_str(doc, f.refresh_token)?.map(RefreshToken::new),
            user_id: optional_str(doc, f.user_id)?,
            device_id: optional_str(doc, f.device_id)?,
        })
    }
}
