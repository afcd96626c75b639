//! Route builders for the client API.
//!
//! Routes are pure values computed from the app id; they hold no state and
//! are cheap to clone.

use crate::types::AppId;

/// Prefix of every client API route.
pub const BASE_ROUTE: &str = "/api/client/v2.0";

fn app_route(app_id: &AppId) -> String {
    format!("{}/app/{}", BASE_ROUTE, app_id)
}

/// All routes used by an app client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppRoutes {
    app_id: AppId,
    auth: AuthRoutes,
    service: ServiceRoutes,
}

impl AppRoutes {
    /// Compute the routes for an app.
    pub fn new(app_id: &AppId) -> Self {
        Self {
            app_id: app_id.clone(),
            auth: AuthRoutes::new(app_id),
            service: ServiceRoutes::new(app_id),
        }
    }

    /// The app these routes belong to.
    pub fn app_id(&self) -> &AppId {
        &self.app_id
    }

    /// Authentication routes.
    pub fn auth(&self) -> &AuthRoutes {
        &self.auth
    }

    /// Service routes.
    pub fn service(&self) -> &ServiceRoutes {
        &self.service
    }

    /// Route returning the app's deployment location and hostname.
    pub fn app_metadata_route(&self) -> String {
        format!("{}/location", app_route(&self.app_id))
    }
}

/// Authentication routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRoutes {
    app_route: String,
}

impl AuthRoutes {
    /// Compute the authentication routes for an app.
    pub fn new(app_id: &AppId) -> Self {
        Self {
            app_route: app_route(app_id),
        }
    }

    /// Route used to refresh (POST) and end (DELETE) a session.
    pub fn session_route(&self) -> String {
        format!("{}/auth/session", BASE_ROUTE)
    }

    /// Route returning the logged-in user's profile.
    pub fn profile_route(&self) -> String {
        format!("{}/auth/profile", BASE_ROUTE)
    }

    /// Base route of a named auth provider.
    pub fn provider_route(&self, provider_name: &str) -> String {
        format!("{}/auth/providers/{}", self.app_route, provider_name)
    }

    /// Login route of a named auth provider.
    pub fn provider_login_route(&self, provider_name: &str) -> String {
        format!("{}/login", self.provider_route(provider_name))
    }
}

/// Service routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRoutes {
    app_route: String,
}

impl ServiceRoutes {
    /// Compute the service routes for an app.
    pub fn new(app_id: &AppId) -> Self {
        Self {
            app_route: app_route(app_id),
        }
    }

    /// Route used to call functions, both app-level and service-scoped.
    pub fn function_call_route(&self) -> String {
        format!("{}/functions/call", self.app_route)
    }
}
