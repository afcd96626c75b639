//! Logged-in user profile.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::codec::{Codec, Document, optional_document, optional_str, required_str};
use crate::error::DecodeError;

const TYPE: &str = "type";
const IDENTITIES: &str = "identities";
const DATA: &str = "data";
const IDENTITY_ID: &str = "id";
const IDENTITY_PROVIDER_TYPE: &str = "provider_type";

/// An identity linked to a user: one provider account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    /// Provider-specific id of the identity.
    pub id: String,
    /// Provider type tag, kept as a string since providers can be added server-side.
    pub provider_type: String,
}

/// The profile returned by the profile route.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UserProfile {
    /// `normal` or `server`, when reported.
    pub user_type: Option<String>,
    pub identities: Vec<UserIdentity>,
    /// Provider-supplied profile data (name, email, picture URL...).
    pub data: BTreeMap<String, String>,
}

/// Codec for [`UserProfile`].
#[derive(Debug, Clone, Copy, Default)]
pub struct UserProfileCodec;

impl Codec<UserProfile> for UserProfileCodec {
    fn encode(&self, profile: &UserProfile) -> Document {
        let mut doc = Document::new();
        if let Some(ref user_type) = profile.user_type {
            doc.insert(TYPE.into(), Value::from(user_type.as_str()));
        }
        let identities = profile
            .identities
            .iter()
            .map(|identity| {
                let mut entry = Document::new();
                entry.insert(IDENTITY_ID.into(), identity.id.clone().into());
                entry.insert(
                    IDENTITY_PROVIDER_TYPE.into(),
                    identity.provider_type.clone().into(),
                );
                Value::Object(entry)
            })
            .collect::<Vec<_>>();
        doc.insert(IDENTITIES.into(), Value::Array(identities));
        doc.insert(
            DATA.into(),
            Value::Object(
                profile
                    .data
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::from(v.as_str())))
                    .collect(),
            ),
        );
        doc
    }

    fn decode(&self, doc: &Document) -> Result<UserProfile, DecodeError> {
        let identities = match doc.get(IDENTITIES) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(entries)) => entries
                .iter()
                .map(|entry| match entry {
                    Value::Object(entry) => Ok(UserIdentity {
                        id: required_str(entry, IDENTITY_ID)?,
                        provider_type: required_str(entry, IDENTITY_PROVIDER_TYPE)?,
                    }),
                    _ => Err(DecodeError::WrongType {
                        field: IDENTITIES.to_string(),
                        expected: "an array of documents",
                    }),
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => {
                return Err(DecodeError::WrongType {
                    field: IDENTITIES.to_string(),
                    expected: "an array",
                });
            }
        };

        let data = match optional_document(doc, DATA)? {
            Some(data) => data
                .keys()
                .map(|key| Ok((key.clone(), required_str(data, key)?)))
                .collect::<Result<BTreeMap<_, _>, DecodeError>>()?,
            None => BTreeMap::new(),
        };

        Ok(UserProfile {
            user_type: optional_str(doc, TYPE)?,
            identities,
            data,
        })
    }
}
