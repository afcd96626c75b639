//! Process-wide lookup of app clients.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use tracing::debug;

use crate::app::{AppClient, AppClientConfig};
use crate::error::{Error, InvalidInputError};
use crate::types::AppId;

/// App clients by app id, plus an optional default client.
///
/// Each app id is initialized at most once; the default client can only be
/// set once.
#[derive(Debug, Default)]
pub struct AppClientRegistry {
    inner: RwLock<Registered>,
}

#[derive(Debug, Default)]
struct Registered {
    clients: HashMap<AppId, AppClient>,
    default_app: Option<AppId>,
}

impl AppClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and register the client for an app.
    ///
    /// # Errors
    ///
    /// Returns an error if the app id is invalid, a client for it already
    /// exists, or the client cannot be created.
    pub fn initialize_app_client(
        &self,
        app_id: &str,
        config: AppClientConfig,
    ) -> Result<AppClient, Error> {
        let app_id = AppId::new(app_id)?;
        let mut registered = self.write();
        Self::insert(&mut registered, app_id, config)
    }

    /// Create and register the client for an app and make it the default.
    ///
    /// # Errors
    ///
    /// Returns an error if a default client was already set, or for any
    /// reason [`initialize_app_client`](Self::initialize_app_client) fails.
    pub fn initialize_default_app_client(
        &self,
        app_id: &str,
        config: AppClientConfig,
    ) -> Result<AppClient, Error> {
        let app_id = AppId::new(app_id)?;
        let mut registered = self.write();
        if let Some(ref existing) = registered.default_app {
            return Err(InvalidInputError::Registry {
                message: format!("default app client already initialized for '{}'", existing),
            }
            .into());
        }
        let client = Self::insert(&mut registered, app_id.clone(), config)?;
        registered.default_app = Some(app_id);
        Ok(client)
    }

    /// Returns the client for an app.
    ///
    /// # Errors
    ///
    /// Returns an error if no client was initialized for `app_id`.
    pub fn app_client(&self, app_id: &str) -> Result<AppClient, Error> {
        let registered = self.read();
        registered
            .clients
            .get(app_id)
            .cloned()
            .ok_or_else(|| {
                InvalidInputError::Registry {
                    message: format!("no app client initialized for '{}'", app_id),
                }
                .into()
            })
    }

    /// Returns the default client.
    ///
    /// # Errors
    ///
    /// Returns an error if no default client was initialized.
    pub fn default_app_client(&self) -> Result<AppClient, Error> {
        let registered = self.read();
        registered
            .default_app
            .as_ref()
            .and_then(|id| registered.clients.get(id))
            .cloned()
            .ok_or_else(|| {
                InvalidInputError::Registry {
                    message: "default app client not initialized".to_string(),
                }
                .into()
            })
    }

    pub fn has_app_client(&self, app_id: &str) -> bool {
        self.read().clients.contains_key(app_id)
    }

    pub fn has_default_app_client(&self) -> bool {
        self.read().default_app.is_some()
    }

    /// Forget every client, including the default.
    pub fn clear(&self) {
        let mut registered = self.write();
        registered.clients.clear();
        registered.default_app = None;
    }

    fn insert(
        registered: &mut Registered,
        app_id: AppId,
        config: AppClientConfig,
    ) -> Result<AppClient, Error> {
        if registered.clients.contains_key(&app_id) {
            return Err(InvalidInputError::Registry {
                message: format!("app client already initialized for '{}'", app_id),
            }
            .into());
        }
        let client = AppClient::new(app_id.clone(), config)?;
        debug!(app_id = %app_id, "Registered app client");
        registered.clients.insert(app_id, client.clone());
        Ok(client)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Registered> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Registered> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::net::{HttpRequest, HttpResponse, Transport};
    use crate::storage::MemoryStorage;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct Offline;

    #[async_trait]
    impl Transport for Offline {
        async fn execute(&self, _request: HttpRequest) -> Result<HttpResponse, TransportError> {
            Err(TransportError::Connection {
                message: "offline".to_string(),
            })
        }
    }

    fn config() -> AppClientConfig {
        AppClientConfig::new(
            "https://stitch.mongodb.com",
            Arc::new(Offline),
            Arc::new(MemoryStorage::new()),
        )
        .unwrap()
    }

    #[test]
    fn clients_are_initialized_once() {
        let registry = AppClientRegistry::new();
        registry.initialize_app_client("app-1", config()).unwrap();

        assert!(registry.has_app_client("app-1"));
        assert!(registry.initialize_app_client("app-1", config()).is_err());
        assert_eq!(registry.app_client("app-1").unwrap().app_id().as_str(), "app-1");
        assert!(registry.app_client("app-2").is_err());
    }

    #[test]
    fn default_client_can_only_be_set_once() {
        let registry = AppClientRegistry::new();
        assert!(registry.default_app_client().is_err());

        registry.initialize_default_app_client("app-1", config()).unwrap();
        assert!(registry.initialize_default_app_client("app-2", config()).is_err());
        assert!(!registry.has_app_client("app-2"));
        assert_eq!(registry.default_app_client().unwrap().app_id().as_str(), "app-1");
    }

    #[test]
    fn clear_forgets_everything() {
        let registry = AppClientRegistry::new();
        registry.initialize_default_app_client("app-1", config()).unwrap();
        registry.clear();

        assert!(!registry.has_app_client("app-1"));
        assert!(!registry.has_default_app_client());
        registry.initialize_default_app_client("app-1", config()).unwrap();
    }

    #[test]
    fn lookups_find_each_client_by_its_id() {
        let registry = AppClientRegistry::new();
        for id in ["app-1", "app-2", "app-3"] {
            registry.initialize_app_client(id, config()).unwrap();
        }

        for id in ["app-1", "app-2", "app-3"] {
            assert!(registry.has_app_client(id));
            assert_eq!(registry.app_client(id).unwrap().app_id().as_str(), id);
        }
        assert!(!registry.has_app_client("bad id"));
        assert!(registry.app_client("bad id").is_err());
    }

    #[test]
    fn invalid_app_ids_are_rejected() {
        let registry = AppClientRegistry::new();
        assert!(registry.initialize_app_client("", config()).is_err());
        assert!(registry.initialize_app_client("bad id", config()).is_err());
    }
}
