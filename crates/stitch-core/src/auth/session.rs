//! The auth state machine and the authenticated request pipeline.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use async_trait::async_trait;
use chrono::Duration;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use serde_json::{Value, json};
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

use crate::codec::{Codec, Document};
use crate::error::{AuthError, Error, ServiceErrorCode, TransportError};
use crate::net::{
    AUTHORIZATION, AuthRequest, AuthRequestClient, Body, HttpResponse, Method, Request,
    RequestClient, TokenKind, decode_document,
};
use crate::routes::AuthRoutes;
use crate::storage::Storage;
use crate::types::AppId;

use super::credential::Credential;
use super::info::{AuthInfo, LoginResponseCodec, RefreshResponseCodec};
use super::profile::{UserProfile, UserProfileCodec};
use super::state::{AuthEvent, AuthState, ListenerHandle, Listeners};
use super::store::AuthInfoStore;
use super::tokens::AccessToken;

/// Default lead time before expiry at which access tokens are refreshed.
pub const DEFAULT_EXPIRY_WINDOW_SECS: i64 = 10;

const PLATFORM: &str = "rust";
const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Behaviour knobs of [`CoreAuth`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthOptions {
    /// Reported as the device's app name on login.
    pub local_app_name: Option<String>,
    /// Reported as the device's app version on login.
    pub local_app_version: Option<String>,
    /// Refresh access tokens that are about to expire before using them.
    pub proactive_refresh: bool,
    /// How close to expiry a token counts as about to expire.
    pub expiry_window_secs: i64,
}

impl Default for AuthOptions {
    fn default() -> Self {
        Self {
            local_app_name: None,
            local_app_version: None,
            proactive_refresh: true,
            expiry_window_secs: DEFAULT_EXPIRY_WINDOW_SECS,
        }
    }
}

type PendingRefresh = Shared<BoxFuture<'static, Result<AccessToken, Error>>>;

#[derive(Clone)]
struct Snapshot {
    state: AuthState,
    info: Option<Arc<AuthInfo>>,
}

struct Inner {
    app_id: AppId,
    routes: AuthRoutes,
    client: RequestClient,
    store: AuthInfoStore,
    options: AuthOptions,
    snapshot: RwLock<Snapshot>,
    // Serializes login, logout and refresh.
    transitions: tokio::sync::Mutex<()>,
    // At most one refresh in flight.
    refresh: Mutex<Option<PendingRefresh>>,
    listeners: Listeners,
}

/// Session management for one app.
///
/// Cheap to clone; clones share the same session.
///
/// The session is held as an immutable snapshot: readers see either the
/// old or the new [`AuthInfo`], never a mix. Login, logout and refresh run
/// one at a time, in the order they were requested. Concurrent requests
/// that find the session expired share a single refresh.
#[derive(Clone)]
pub struct CoreAuth {
    inner: Arc<Inner>,
}

impl CoreAuth {
    /// Create the auth component, restoring any persisted session.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the persisted session cannot be read.
    pub fn new(
        app_id: AppId,
        client: RequestClient,
        storage: Arc<dyn Storage>,
        options: AuthOptions,
    ) -> Result<Self, Error> {
        let store = AuthInfoStore::new(storage, &app_id);
        let info = store.load()?.map(Arc::new);
        let state = match info {
            Some(ref info) => {
                info!(app_id = %app_id, user_id = %info.user_id, "Restored session");
                AuthState::LoggedIn
            }
            None => AuthState::LoggedOut,
        };

        Ok(Self {
            inner: Arc::new(Inner {
                routes: AuthRoutes::new(&app_id),
                app_id,
                client,
                store,
                options,
                snapshot: RwLock::new(Snapshot { state, info }),
                transitions: tokio::sync::Mutex::new(()),
                refresh: Mutex::new(None),
                listeners: Listeners::new(),
            }),
        })
    }

    /// Returns the app this component authenticates against.
    pub fn app_id(&self) -> &AppId {
        &self.inner.app_id
    }

    /// Returns the current state.
    pub fn state(&self) -> AuthState {
        self.inner.snapshot().state
    }

    pub fn is_logged_in(&self) -> bool {
        self.inner.snapshot().info.is_some()
    }

    /// Returns the active session, if any.
    pub fn auth_info(&self) -> Option<AuthInfo> {
        self.inner.snapshot().info.map(|info| (*info).clone())
    }

    pub fn user_id(&self) -> Option<String> {
        self.inner.snapshot().info.map(|info| info.user_id.clone())
    }

    pub fn device_id(&self) -> Option<String> {
        self.inner.snapshot().info.map(|info| info.device_id.clone())
    }

    pub fn has_device_id(&self) -> bool {
        self.inner
            .snapshot()
            .info
            .is_some_and(|info| !info.device_id.is_empty())
    }

    /// Call `listener` on every committed state transition.
    ///
    /// Listeners run on their own task and never block the transition.
    /// Must be called from within a tokio runtime.
    pub fn add_auth_listener<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(&AuthEvent) + Send + Sync + 'static,
    {
        self.inner.listeners.add(listener)
    }

    /// Unregister a listener.
    pub fn remove_auth_listener(&self, handle: ListenerHandle) {
        handle.remove();
    }

    /// Receive state transitions as a stream of events.
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.inner.listeners.subscribe()
    }

    /// Log in with a credential.
    ///
    /// When already logged in:
    /// - a credential that reuses sessions, of the active provider type,
    ///   returns the active session;
    /// - a credential for another provider fails with
    ///   [`AuthError::LoginWithDifferentProvider`] and changes nothing;
    /// - a credential for the active provider ends the current session and
    ///   logs in again.
    ///
    /// # Errors
    ///
    /// On failure the client is left logged out and nothing is persisted.
    /// A storage error after a successful login is returned even though the
    /// session is active in memory.
    #[instrument(skip(self, credential), fields(app_id = %self.inner.app_id, provider = credential.provider_name()))]
    pub async fn login(&self, credential: &Credential) -> Result<AuthInfo, Error> {
        let inner = &self.inner;
        let _transition = inner.transitions.lock().await;

        let mut device_id = None;
        if let Some(active) = inner.snapshot().info {
            if credential.capabilities().reuses_existing_session
                && active.logged_in_provider_type == credential.provider_type()
            {
                debug!("Reusing existing session");
                return Ok((*active).clone());
            }
            if active.logged_in_provider_type != credential.provider_type()
                || active.logged_in_provider_name != credential.provider_name()
            {
                return Err(AuthError::LoginWithDifferentProvider {
                    active: active.logged_in_provider_name.clone(),
                    requested: credential.provider_name().to_string(),
                }
                .into());
            }
            info!("Replacing session of the same provider");
            device_id = Some(active.device_id.clone());
            inner.end_session(&active).await?;
        }

        inner.commit(AuthState::LoggingIn, None);
        let pending = PendingLogin {
            inner: inner.as_ref(),
            done: false,
        };
        match inner.request_login(credential, device_id.as_deref()).await {
            Ok(info) => {
                let info = Arc::new(info);
                pending.complete(Arc::clone(&info));
                info!(user_id = %info.user_id, "Logged in");
                inner.store.save(&info)?;
                Ok((*info).clone())
            }
            Err(e) => {
                warn!(error = %e, "Login failed");
                Err(e)
            }
        }
    }

    /// End the session.
    ///
    /// The backend is told to invalidate the refresh token; if that fails
    /// the local session is cleared anyway. Logging out while logged out
    /// does nothing.
    #[instrument(skip(self), fields(app_id = %self.inner.app_id))]
    pub async fn logout(&self) -> Result<(), Error> {
        let _transition = self.inner.transitions.lock().await;
        match self.inner.snapshot().info {
            Some(active) => self.inner.end_session(&active).await,
            None => {
                debug!("Already logged out");
                Ok(())
            }
        }
    }

    /// Exchange the refresh token for a new access token.
    ///
    /// Joins the refresh already in flight, if there is one.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidSession`] when logged out or when the
    /// backend rejects the refresh token; the session is then cleared.
    /// Other failures are returned unchanged and leave the session as it was.
    pub async fn refresh(&self) -> Result<AccessToken, Error> {
        self.coalesced_refresh(None).await
    }

    /// Fetch the profile of the logged-in user.
    #[instrument(skip(self), fields(app_id = %self.inner.app_id))]
    pub async fn user_profile(&self) -> Result<UserProfile, Error> {
        let request = AuthRequest::new(Request::new(
            Method::Get,
            self.inner.routes.profile_route(),
            Body::Empty,
        )?);
        let response = self.do_authenticated_request(&request).await?;
        Ok(UserProfileCodec.decode(&decode_document(&response)?)?)
    }

    /// Refresh because the access token of `stale` was found expired.
    ///
    /// If the same user's session already moved past `stale`, the current
    /// token is returned without another refresh. If another user logged in
    /// meanwhile, `stale` is gone for good.
    async fn refresh_after_expiry(&self, stale: &AuthInfo) -> Result<AccessToken, Error> {
        self.coalesced_refresh(Some(stale)).await
    }

    async fn coalesced_refresh(&self, stale: Option<&AuthInfo>) -> Result<AccessToken, Error> {
        let pending = {
            let mut slot = self
                .inner
                .refresh
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            match slot.as_ref() {
                Some(pending) => {
                    debug!("Joining in-flight refresh");
                    pending.clone()
                }
                None => {
                    if let (Some(stale), Some(info)) = (stale, self.inner.snapshot().info) {
                        if info.user_id != stale.user_id {
                            debug!("Session replaced by another user");
                            return Err(AuthError::InvalidSession.into());
                        }
                        if info.access_token != stale.access_token {
                            debug!("Session already refreshed");
                            return Ok(info.access_token.clone());
                        }
                    }

                    // The refresh runs on its own task so that callers giving
                    // up do not abort the exchange.
                    let inner = Arc::clone(&self.inner);
                    let task = tokio::spawn(async move {
                        let result = inner.refresh_session().await;
                        inner
                            .refresh
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .take();
                        result
                    });
                    let pending = async move {
                        task.await.unwrap_or_else(|e| {
                            Err(TransportError::Http {
                                message: format!("refresh task failed: {}", e),
                            }
                            .into())
                        })
                    }
                    .boxed()
                    .shared();
                    *slot = Some(pending.clone());
                    pending
                }
            }
        };
        pending.await
    }

    fn current_session(&self) -> Result<Arc<AuthInfo>, Error> {
        self.inner
            .snapshot()
            .info
            .ok_or_else(|| AuthError::MustAuthenticateFirst.into())
    }

    /// Returns the current session if it still belongs to the user of `previous`.
    fn same_user_session(&self, previous: &AuthInfo) -> Result<Arc<AuthInfo>, Error> {
        let current = self.current_session()?;
        if current.user_id != previous.user_id {
            return Err(AuthError::InvalidSession.into());
        }
        Ok(current)
    }
}

/// A login between `LoggingIn` and its outcome.
///
/// Dropping it without [`PendingLogin::complete`], on failure or when the
/// caller abandons the login, returns the state to `LoggedOut`.
struct PendingLogin<'a> {
    inner: &'a Inner,
    done: bool,
}

impl PendingLogin<'_> {
    fn complete(mut self, info: Arc<AuthInfo>) {
        self.inner.commit(AuthState::LoggedIn, Some(info));
        self.done = true;
    }
}

impl Drop for PendingLogin<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.inner.commit(AuthState::LoggedOut, None);
        }
    }
}

impl Inner {
    fn snapshot(&self) -> Snapshot {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Publish a new snapshot and notify listeners of a state change.
    fn commit(&self, state: AuthState, info: Option<Arc<AuthInfo>>) {
        let user_id = info.as_ref().map(|info| info.user_id.clone());
        let previous = {
            let mut snapshot = self
                .snapshot
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            let previous = snapshot.state;
            *snapshot = Snapshot { state, info };
            previous
        };

        if previous != state {
            debug!(%previous, current = %state, "Auth state changed");
            self.listeners.notify(AuthEvent {
                previous,
                current: state,
                user_id,
            });
        }
    }

    /// Send a request authorized by `session`.
    async fn send(&self, request: &AuthRequest, session: &AuthInfo) -> Result<HttpResponse, Error> {
        let token = match request.token() {
            TokenKind::Access => session.access_token.as_str(),
            TokenKind::Refresh => session.refresh_token.as_str(),
        };
        let authorized = request
            .request()
            .clone()
            .with_header(AUTHORIZATION, format!("Bearer {}", token));
        self.client.do_request(&authorized).await
    }

    async fn request_login(
        &self,
        credential: &Credential,
        device_id: Option<&str>,
    ) -> Result<AuthInfo, Error> {
        let mut body: Document = credential
            .material()
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect();
        body.insert(
            "options".into(),
            json!({ "device": self.device_info(device_id) }),
        );

        let request = Request::new(
            Method::Post,
            self.routes.provider_login_route(credential.provider_name()),
            Body::Document(body),
        )?;
        let response = self
            .client
            .do_request(&request)
            .await
            .map_err(auth_failure)?;
        let login = LoginResponseCodec.decode(&decode_document(&response)?)?;

        Ok(login.into_auth_info(credential.provider_type(), credential.provider_name()))
    }

    fn device_info(&self, device_id: Option<&str>) -> Document {
        let mut device = Document::new();
        let app_name = self
            .options
            .local_app_name
            .as_deref()
            .unwrap_or(self.app_id.as_str());
        device.insert("appId".into(), app_name.into());
        if let Some(ref version) = self.options.local_app_version {
            device.insert("appVersion".into(), version.as_str().into());
        }
        device.insert("platform".into(), PLATFORM.into());
        device.insert("platformVersion".into(), std::env::consts::OS.into());
        device.insert("sdkVersion".into(), SDK_VERSION.into());
        if let Some(id) = device_id {
            device.insert("deviceId".into(), id.into());
        }
        device
    }

    /// Invalidate the session server-side, then clear it locally.
    ///
    /// Caller holds `transitions`.
    async fn end_session(&self, active: &AuthInfo) -> Result<(), Error> {
        let request = AuthRequest::with_refresh_token(Request::new(
            Method::Delete,
            self.routes.session_route(),
            Body::Empty,
        )?);
        if let Err(e) = self.send(&request, active).await {
            warn!(error = %e, "Server-side logout failed, clearing local session anyway");
        }

        self.commit(AuthState::LoggedOut, None);
        info!(user_id = %active.user_id, "Logged out");
        self.store.clear()?;
        Ok(())
    }

    async fn refresh_session(&self) -> Result<AccessToken, Error> {
        let _transition = self.transitions.lock().await;
        let Some(active) = self.snapshot().info else {
            return Err(AuthError::InvalidSession.into());
        };
        let request = AuthRequest::with_refresh_token(Request::new(
            Method::Post,
            self.routes.session_route(),
            Body::Empty,
        )?);

        self.commit(AuthState::Refreshing, Some(Arc::clone(&active)));
        info!("Refreshing session");

        let outcome = match self.send(&request, &active).await {
            Ok(response) => decode_document(&response)
                .and_then(|doc| RefreshResponseCodec.decode(&doc))
                .map_err(Error::from),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(response) => {
                let refreshed = Arc::new(active.refreshed(response));
                let token = refreshed.access_token.clone();
                self.commit(AuthState::LoggedIn, Some(Arc::clone(&refreshed)));
                debug!("Session refreshed");
                self.store.save(&refreshed)?;
                Ok(token)
            }
            Err(e) if e.is_invalid_session() => {
                warn!("Refresh token rejected, clearing session");
                self.commit(AuthState::LoggedOut, None);
                self.store.clear()?;
                Err(AuthError::InvalidSession.into())
            }
            Err(e) => {
                warn!(error = %e, "Refresh failed");
                self.commit(AuthState::LoggedIn, Some(active));
                Err(auth_failure(e))
            }
        }
    }
}

#[async_trait]
impl AuthRequestClient for CoreAuth {
    /// Send a request with the session attached.
    ///
    /// A request rejected with an expired session is retried exactly once,
    /// after a refresh shared with every other caller that hit the same
    /// expiry. Tokens about to expire are refreshed before sending when
    /// proactive refresh is on.
    #[instrument(skip(self, request), fields(method = %request.request().method(), path = request.request().path()))]
    async fn do_authenticated_request(&self, request: &AuthRequest) -> Result<HttpResponse, Error> {
        let mut session = self.current_session()?;

        let window = Duration::seconds(self.inner.options.expiry_window_secs);
        if request.token() == TokenKind::Access
            && self.inner.options.proactive_refresh
            && session.access_token.expires_within(window)
        {
            debug!("Access token about to expire, refreshing first");
            if let Err(e) = self.refresh_after_expiry(&session).await {
                // Send anyway unless the session is gone or the token already expired.
                if !self.is_logged_in() || session.access_token.expires_within(Duration::zero())
                {
                    return Err(e);
                }
                warn!(error = %e, "Early refresh failed, sending with the current token");
            }
            session = self.same_user_session(&session)?;
        }

        let rejected = match self.inner.send(request, &session).await {
            Err(e) if e.is_invalid_session() => e,
            other => return other,
        };
        if request.token() == TokenKind::Refresh || !request.retries_on_expired_session() {
            debug!(error = %rejected, "Session rejected, not retrying");
            return Err(AuthError::InvalidSession.into());
        }

        debug!("Session expired, refreshing and retrying once");
        self.refresh_after_expiry(&session).await?;
        let session = self.same_user_session(&session)?;
        match self.inner.send(request, &session).await {
            Err(e) if e.is_invalid_session() => {
                warn!("Session rejected again after refresh");
                Err(AuthError::InvalidSession.into())
            }
            other => other,
        }
    }
}

impl fmt::Debug for CoreAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreAuth")
            .field("app_id", &self.inner.app_id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Map backend codes that have a dedicated auth error.
fn auth_failure(err: Error) -> Error {
    match err.service_error_code() {
        Some(ServiceErrorCode::UserNotFound) => AuthError::UserNotFound.into(),
        _ => err,
    }
}
