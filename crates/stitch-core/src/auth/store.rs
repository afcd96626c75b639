//! Persisted session record.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use crate::codec::{Codec, Document, as_document};
use crate::error::StorageError;
use crate::storage::Storage;
use crate::types::AppId;

use super::info::{AuthInfo, AuthInfoCodec, FieldNames};

const SCHEMA_VERSION_FIELD: &str = "schemaVersion";

/// Version of the record layout written by this client.
pub const SCHEMA_VERSION: u64 = 2;

/// Loads and saves the [`AuthInfo`] of one app.
///
/// Version 2 records use the camelCase layout and carry `schemaVersion`.
/// Records without a version are version 1, written in the snake_case
/// layout; they are migrated in place on load.
#[derive(Clone)]
pub struct AuthInfoStore {
    storage: Arc<dyn Storage>,
    key: String,
}

impl AuthInfoStore {
    /// Store for the given app.
    pub fn new(storage: Arc<dyn Storage>, app_id: &AppId) -> Self {
        Self {
            storage,
            key: Self::key_for(app_id),
        }
    }

    /// Storage key of the session record for an app.
    pub fn key_for(app_id: &AppId) -> String {
        format!("__stitch.client.{}.auth_info", app_id)
    }

    /// Returns the storage key used by this store.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Load the persisted session, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Corrupt`] if the record cannot be decoded,
    /// has an unknown schema version, or migration fails to write back.
    pub fn load(&self) -> Result<Option<AuthInfo>, StorageError> {
        let Some(bytes) = self.storage.get(&self.key)? else {
            return Ok(None);
        };

        let doc = serde_json::from_slice::<Value>(&bytes)
            .map_err(|e| self.corrupt(e))
            .and_then(|value| as_document(value).map_err(|e| self.corrupt(e)))?;

        let version = match doc.get(SCHEMA_VERSION_FIELD) {
            None | Some(Value::Null) => 1,
            Some(value) => value
                .as_u64()
                .ok_or_else(|| self.corrupt("schemaVersion is not a number"))?,
        };

        match version {
            1 => {
                let info = AuthInfoCodec::new(FieldNames::WIRE)
                    .decode(&doc)
                    .map_err(|e| self.corrupt(e))?;
                info!(key = %self.key, "Migrating session record to schema version 2");
                self.save(&info)?;
                Ok(Some(info))
            }
            SCHEMA_VERSION => {
                let info = AuthInfoCodec::new(FieldNames::STORE)
                    .decode(&doc)
                    .map_err(|e| self.corrupt(e))?;
                debug!(key = %self.key, "Loaded session record");
                Ok(Some(info))
            }
            other => Err(self.corrupt(format!("unsupported schema version {}", other))),
        }
    }

    /// Persist a session, replacing the previous record.
    pub fn save(&self, info: &AuthInfo) -> Result<(), StorageError> {
        let mut doc: Document = AuthInfoCodec::new(FieldNames::STORE).encode(info);
        doc.insert(SCHEMA_VERSION_FIELD.into(), Value::from(SCHEMA_VERSION));
        let bytes = serde_json::to_vec(&doc).map_err(|e| StorageError::Write {
            key: self.key.clone(),
            message: e.to_string(),
        })?;
        self.storage.set(&self.key, &bytes)
    }

    /// Remove the persisted session.
    pub fn clear(&self) -> Result<(), StorageError> {
        self.storage.remove(&self.key)
    }

    fn corrupt(&self, message: impl ToString) -> StorageError {
        StorageError::Corrupt {
            key: self.key.clone(),
            message: message.to_string(),
        }
    }
}
