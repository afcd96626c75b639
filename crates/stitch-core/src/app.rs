//! The per-app client.

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::auth::{AuthOptions, CoreAuth};
use crate::error::Error;
use crate::net::{RequestClient, Transport};
use crate::routes::AppRoutes;
use crate::services::ServiceClient;
use crate::storage::Storage;
use crate::types::{AppId, BaseUrl};

/// Everything an [`AppClient`] needs besides its app id.
#[derive(Clone)]
pub struct AppClientConfig {
    pub base_url: BaseUrl,
    pub transport: Arc<dyn Transport>,
    pub storage: Arc<dyn Storage>,
    /// Name of the application embedding the client, reported on login.
    pub local_app_name: Option<String>,
    /// Version of the application embedding the client, reported on login.
    pub local_app_version: Option<String>,
    /// Refresh access tokens shortly before they expire.
    pub proactive_refresh: bool,
}

impl AppClientConfig {
    /// Configuration for the given backend, validating its base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if `base_url` is not a valid backend URL.
    pub fn new(
        base_url: &str,
        transport: Arc<dyn Transport>,
        storage: Arc<dyn Storage>,
    ) -> Result<Self, Error> {
        Ok(Self::with_base_url(BaseUrl::new(base_url)?, transport, storage))
    }

    /// Configuration for an already validated base URL.
    pub fn with_base_url(
        base_url: BaseUrl,
        transport: Arc<dyn Transport>,
        storage: Arc<dyn Storage>,
    ) -> Self {
        Self {
            base_url,
            transport,
            storage,
            local_app_name: None,
            local_app_version: None,
            proactive_refresh: true,
        }
    }

    fn auth_options(&self) -> AuthOptions {
        AuthOptions {
            local_app_name: self.local_app_name.clone(),
            local_app_version: self.local_app_version.clone(),
            proactive_refresh: self.proactive_refresh,
            ..AuthOptions::default()
        }
    }
}

impl fmt::Debug for AppClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppClientConfig")
            .field("base_url", &self.base_url)
            .field("local_app_name", &self.local_app_name)
            .field("local_app_version", &self.local_app_version)
            .field("proactive_refresh", &self.proactive_refresh)
            .finish_non_exhaustive()
    }
}

/// Client for one app: its session and its functions.
///
/// Cheap to clone; clones share the same session.
#[derive(Clone)]
pub struct AppClient {
    auth: CoreAuth,
    routes: AppRoutes,
    functions: ServiceClient,
}

impl AppClient {
    /// Create a client, restoring any persisted session.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the persisted session cannot be read.
    pub fn new(app_id: AppId, config: AppClientConfig) -> Result<Self, Error> {
        let routes = AppRoutes::new(&app_id);
        let client = RequestClient::new(config.base_url.clone(), Arc::clone(&config.transport));
        let auth = CoreAuth::new(
            app_id,
            client,
            Arc::clone(&config.storage),
            config.auth_options(),
        )?;
        let functions = ServiceClient::new(Arc::new(auth.clone()), routes.service().clone(), None);

        Ok(Self {
            auth,
            routes,
            functions,
        })
    }

    pub fn app_id(&self) -> &AppId {
        self.routes.app_id()
    }

    pub fn routes(&self) -> &AppRoutes {
        &self.routes
    }

    /// Returns the auth component.
    pub fn auth(&self) -> &CoreAuth {
        &self.auth
    }

    /// Call an app function. See [`ServiceClient::call_function`].
    pub async fn call_function<T: DeserializeOwned>(
        &self,
        name: &str,
        args: Vec<Value>,
    ) -> Result<T, Error> {
        self.functions.call_function(name, args).await
    }

    /// Returns a client for functions of a named service.
    pub fn service(&self, name: impl Into<String>) -> ServiceClient {
        ServiceClient::new(
            Arc::new(self.auth.clone()),
            self.routes.service().clone(),
            Some(name.into()),
        )
    }
}

impl fmt::Debug for AppClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppClient")
            .field("app_id", self.app_id())
            .field("auth", &self.auth)
            .finish_non_exhaustive()
    }
}
