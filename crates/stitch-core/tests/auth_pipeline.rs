//! Auth pipeline tests against an in-memory fake backend.
//!
//! The fake backend issues sessions, validates bearer tokens, echoes
//! function arguments and counts every call, so the tests can check how
//! many logins, refreshes and retries a scenario caused.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use futures_util::future::join_all;
use serde_json::{Value, json};
use stitch_core::codec::ejson::{self, Mode};
use stitch_core::{
    AppClient, AppClientConfig, AppId, AuthError, AuthState, Credential, Error, HttpRequest,
    HttpResponse, MemoryStorage, Storage, StorageError, Transport, TransportError,
};
use tokio::sync::Notify;

const APP_ID: &str = "todo-app-abcde";
const REFRESH_TOKEN: &str = "refresh-1";

#[derive(Default)]
struct FakeBackend {
    valid_access: Mutex<String>,
    issued: AtomicUsize,
    logins: AtomicUsize,
    refreshes: AtomicUsize,
    logouts: AtomicUsize,
    function_calls: AtomicUsize,
    refresh_revoked: AtomicBool,
    refresh_unavailable: AtomicBool,
    reject_all_access: AtomicBool,
    short_lived_tokens: AtomicBool,
    slow_login: AtomicBool,
    /// Function calls wait on this gate, when set, before checking the token.
    call_gate: Mutex<Option<Arc<Notify>>>,
    /// User id of the next login, `user-1` when unset.
    next_user: Mutex<Option<String>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl FakeBackend {
    fn issue_access_token(&self) -> String {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let token = if self.short_lived_tokens.load(Ordering::SeqCst) && n == 1 {
            jwt(chrono::Utc::now().timestamp() + 5)
        } else {
            format!("access-{}", n)
        };
        *self.valid_access.lock().unwrap() = token.clone();
        token
    }

    /// Make the current access token stale, as if it expired.
    fn expire_access_token(&self) {
        *self.valid_access.lock().unwrap() = "expired".to_string();
    }

    fn bearer(request: &HttpRequest) -> Option<&str> {
        request
            .headers
            .get("Authorization")
            .and_then(|value| value.strip_prefix("Bearer "))
    }

    fn access_ok(&self, request: &HttpRequest) -> bool {
        !self.reject_all_access.load(Ordering::SeqCst)
            && Self::bearer(request) == Some(self.valid_access.lock().unwrap().as_str())
    }

    fn login_bodies(&self) -> Vec<Value> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.url.ends_with("/login"))
            .map(|r| ejson::parse(r.body.as_deref().unwrap_or("null"), Mode::Relaxed).unwrap())
            .collect()
    }
}

fn reply(status: u16, body: Value) -> HttpResponse {
    HttpResponse {
        status,
        headers: Default::default(),
        body: body.to_string(),
    }
}

fn invalid_session() -> HttpResponse {
    reply(
        401,
        json!({ "error": "invalid session", "error_code": "InvalidSession" }),
    )
}

fn jwt(exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{}}}"#, exp));
    format!("{}.{}.sig", header, payload)
}

#[async_trait]
impl Transport for FakeBackend {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        let url = request.url.as_str();
        let method = request.method.as_str();

        let response = if url.ends_with("/login") {
            if self.slow_login.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            self.logins.fetch_add(1, Ordering::SeqCst);
            let user_id = self
                .next_user
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(|| "user-1".to_string());
            reply(
                200,
                json!({
                    "access_token": self.issue_access_token(),
                    "refresh_token": REFRESH_TOKEN,
                    "user_id": user_id,
                    "device_id": "device-1"
                }),
            )
        } else if url.ends_with("/auth/session") && method == "POST" {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            // Hold the refresh open long enough for callers to pile up.
            tokio::time::sleep(Duration::from_millis(50)).await;
            if self.refresh_unavailable.load(Ordering::SeqCst) {
                reply(500, json!({ "error": "down", "error_code": "InternalServerError" }))
            } else if self.refresh_revoked.load(Ordering::SeqCst)
                || Self::bearer(&request) != Some(REFRESH_TOKEN)
            {
                invalid_session()
            } else {
                reply(200, json!({ "access_token": self.issue_access_token() }))
            }
        } else if url.ends_with("/auth/session") && method == "DELETE" {
            self.logouts.fetch_add(1, Ordering::SeqCst);
            reply(204, Value::Null)
        } else if url.ends_with("/functions/call") {
            self.function_calls.fetch_add(1, Ordering::SeqCst);
            let gate = self.call_gate.lock().unwrap().clone();
            if let Some(gate) = gate {
                gate.notified().await;
            }
            if !self.access_ok(&request) {
                invalid_session()
            } else {
                let body = ejson::parse(request.body.as_deref().unwrap_or("{}"), Mode::Relaxed)
                    .unwrap();
                match body["name"].as_str() {
                    Some("echo") => HttpResponse {
                        status: 200,
                        headers: Default::default(),
                        body: ejson::stringify(&body["arguments"][0]),
                    },
                    _ => reply(
                        404,
                        json!({ "error": "function not found", "error_code": "FunctionNotFound" }),
                    ),
                }
            }
        } else if url.ends_with("/auth/profile") {
            if !self.access_ok(&request) {
                invalid_session()
            } else {
                reply(
                    200,
                    json!({
                        "type": "normal",
                        "identities": [{ "id": "anon-1", "provider_type": "anon-user" }],
                        "data": {}
                    }),
                )
            }
        } else {
            reply(404, json!({ "error": "no route" }))
        };
        Ok(response)
    }
}

fn client_with(backend: &Arc<FakeBackend>, storage: &MemoryStorage) -> AppClient {
    let config = AppClientConfig::new(
        "https://stitch.test",
        backend.clone(),
        Arc::new(storage.clone()),
    )
    .unwrap();
    AppClient::new(AppId::new(APP_ID).unwrap(), config).unwrap()
}

fn setup() -> (AppClient, Arc<FakeBackend>, MemoryStorage) {
    let backend = Arc::new(FakeBackend::default());
    let storage = MemoryStorage::new();
    let client = client_with(&backend, &storage);
    (client, backend, storage)
}

#[tokio::test]
async fn test_anonymous_login_then_echo() {
    let (client, backend, _) = setup();

    let info = client.auth().login(&Credential::anonymous()).await.unwrap();
    assert_eq!(info.user_id, "user-1");
    assert_eq!(client.auth().state(), AuthState::LoggedIn);

    let echoed: String = client
        .call_function("echo", vec![json!("hello world!")])
        .await
        .unwrap();
    assert_eq!(echoed, "hello world!");

    let login = &backend.login_bodies()[0];
    assert_eq!(login["options"]["device"]["appId"], json!(APP_ID));
    assert!(login["options"]["device"]["sdkVersion"].is_string());
    let requests = backend.requests.lock().unwrap();
    assert!(
        requests[0]
            .url
            .ends_with("/api/client/v2.0/app/todo-app-abcde/auth/providers/anon-user/login")
    );
}

#[tokio::test]
async fn test_concurrent_expired_requests_share_one_refresh() {
    let (client, backend, _) = setup();
    client.auth().login(&Credential::anonymous()).await.unwrap();
    backend.expire_access_token();

    let calls = (0..10).map(|i| {
        let client = client.clone();
        async move { client.call_function::<i64>("echo", vec![json!(i)]).await }
    });
    let results = join_all(calls).await;

    for (i, result) in results.into_iter().enumerate() {
        assert_eq!(result.unwrap(), i as i64);
    }
    assert_eq!(backend.refreshes.load(Ordering::SeqCst), 1);
    assert_eq!(client.auth().state(), AuthState::LoggedIn);
}

#[tokio::test]
async fn test_expired_session_is_retried_at_most_once() {
    let (client, backend, _) = setup();
    client.auth().login(&Credential::anonymous()).await.unwrap();
    backend.reject_all_access.store(true, Ordering::SeqCst);

    let err = client
        .call_function::<Value>("echo", vec![json!(1)])
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Auth(AuthError::InvalidSession)));
    assert_eq!(backend.function_calls.load(Ordering::SeqCst), 2);
    assert_eq!(backend.refreshes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_rejected_refresh_token_clears_the_session() {
    let (client, backend, storage) = setup();
    client.auth().login(&Credential::anonymous()).await.unwrap();
    assert!(!storage.is_empty());

    backend.expire_access_token();
    backend.refresh_revoked.store(true, Ordering::SeqCst);

    let err = client
        .call_function::<Value>("echo", vec![json!(1)])
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Auth(AuthError::InvalidSession)));
    assert_eq!(client.auth().state(), AuthState::LoggedOut);
    assert!(storage.is_empty());
    assert_eq!(backend.function_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_other_failures_are_not_retried() {
    let (client, backend, _) = setup();
    client.auth().login(&Credential::anonymous()).await.unwrap();

    let err = client
        .call_function::<Value>("missing", vec![])
        .await
        .unwrap_err();

    assert_eq!(
        err.service_error_code(),
        Some(&stitch_core::ServiceErrorCode::FunctionNotFound)
    );
    assert_eq!(backend.function_calls.load(Ordering::SeqCst), 1);
    assert_eq!(backend.refreshes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_failed_refresh_keeps_the_session() {
    let (client, backend, _) = setup();
    client.auth().login(&Credential::anonymous()).await.unwrap();
    backend.refresh_unavailable.store(true, Ordering::SeqCst);

    let err = client.auth().refresh().await.unwrap_err();

    assert!(matches!(err, Error::Transport(TransportError::Service(_))));
    assert_eq!(client.auth().state(), AuthState::LoggedIn);
    assert!(client.auth().is_logged_in());
}

#[tokio::test]
async fn test_explicit_refresh_replaces_only_the_access_token() {
    let (client, _, _) = setup();
    let before = client.auth().login(&Credential::anonymous()).await.unwrap();

    let token = client.auth().refresh().await.unwrap();

    let after = client.auth().auth_info().unwrap();
    assert_eq!(after.access_token, token);
    assert_ne!(after.access_token, before.access_token);
    assert_eq!(after.refresh_token, before.refresh_token);
    assert_eq!(after.user_id, before.user_id);
}

#[tokio::test]
async fn test_tokens_about_to_expire_are_refreshed_before_use() {
    let (client, backend, _) = setup();
    backend.short_lived_tokens.store(true, Ordering::SeqCst);
    client.auth().login(&Credential::anonymous()).await.unwrap();

    let echoed: i64 = client.call_function("echo", vec![json!(7)]).await.unwrap();

    assert_eq!(echoed, 7);
    assert_eq!(backend.refreshes.load(Ordering::SeqCst), 1);
    assert_eq!(backend.function_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failed_early_refresh_still_sends_a_valid_token() {
    let (client, backend, _) = setup();
    backend.short_lived_tokens.store(true, Ordering::SeqCst);
    client.auth().login(&Credential::anonymous()).await.unwrap();
    backend.refresh_unavailable.store(true, Ordering::SeqCst);

    let echoed: i64 = client.call_function("echo", vec![json!(7)]).await.unwrap();

    assert_eq!(echoed, 7);
    assert_eq!(backend.refreshes.load(Ordering::SeqCst), 1);
    assert_eq!(backend.function_calls.load(Ordering::SeqCst), 1);
    assert_eq!(client.auth().state(), AuthState::LoggedIn);
}

#[tokio::test]
async fn test_early_refresh_rejection_ends_the_session() {
    let (client, backend, _) = setup();
    backend.short_lived_tokens.store(true, Ordering::SeqCst);
    client.auth().login(&Credential::anonymous()).await.unwrap();
    backend.refresh_revoked.store(true, Ordering::SeqCst);

    let err = client
        .call_function::<i64>("echo", vec![json!(7)])
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Auth(AuthError::InvalidSession)));
    assert_eq!(backend.function_calls.load(Ordering::SeqCst), 0);
    assert!(!client.auth().is_logged_in());
}

#[tokio::test]
async fn test_login_with_another_provider_is_refused() {
    let (client, backend, _) = setup();
    let active = client.auth().login(&Credential::anonymous()).await.unwrap();

    let err = client
        .auth()
        .login(&Credential::user_password("alice@example.com", "secret"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Auth(AuthError::LoginWithDifferentProvider { .. })
    ));
    assert_eq!(client.auth().auth_info(), Some(active));
    assert_eq!(backend.logins.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_anonymous_login_reuses_the_session() {
    let (client, backend, _) = setup();
    let first = client.auth().login(&Credential::anonymous()).await.unwrap();
    let second = client.auth().login(&Credential::anonymous()).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(backend.logins.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_same_provider_login_replaces_the_session() {
    let (client, backend, _) = setup();
    let credential = Credential::user_password("alice@example.com", "secret");
    let first = client.auth().login(&credential).await.unwrap();
    let second = client.auth().login(&credential).await.unwrap();

    assert_ne!(first.access_token, second.access_token);
    assert_eq!(backend.logins.load(Ordering::SeqCst), 2);
    assert_eq!(backend.logouts.load(Ordering::SeqCst), 1);

    let bodies = backend.login_bodies();
    assert_eq!(bodies[0]["username"], json!("alice@example.com"));
    assert!(bodies[0]["options"]["device"].get("deviceId").is_none());
    assert_eq!(bodies[1]["options"]["device"]["deviceId"], json!("device-1"));
}

#[tokio::test]
async fn test_logout_is_idempotent() {
    let (client, backend, storage) = setup();
    client.auth().login(&Credential::anonymous()).await.unwrap();

    client.auth().logout().await.unwrap();
    client.auth().logout().await.unwrap();

    assert_eq!(client.auth().state(), AuthState::LoggedOut);
    assert_eq!(backend.logouts.load(Ordering::SeqCst), 1);
    assert!(storage.is_empty());

    let err = client
        .call_function::<Value>("echo", vec![json!(1)])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Auth(AuthError::MustAuthenticateFirst)));
}

#[tokio::test]
async fn test_session_survives_a_restart() {
    let (client, backend, storage) = setup();
    let info = client.auth().login(&Credential::anonymous()).await.unwrap();

    let restarted = client_with(&backend, &storage);

    assert_eq!(restarted.auth().state(), AuthState::LoggedIn);
    assert_eq!(restarted.auth().auth_info(), Some(info));
    let stored = storage
        .get("__stitch.client.todo-app-abcde.auth_info")
        .unwrap()
        .unwrap();
    let stored: Value = serde_json::from_slice(&stored).unwrap();
    assert_eq!(stored["schemaVersion"], json!(2));
}

#[tokio::test]
async fn test_listeners_see_every_transition() {
    let (client, backend, _) = setup();
    let mut events = client.auth().subscribe();

    client.auth().login(&Credential::anonymous()).await.unwrap();
    backend.expire_access_token();
    let _: i64 = client.call_function("echo", vec![json!(1)]).await.unwrap();
    client.auth().logout().await.unwrap();

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push((event.previous, event.current));
    }
    assert_eq!(
        seen,
        vec![
            (AuthState::LoggedOut, AuthState::LoggingIn),
            (AuthState::LoggingIn, AuthState::LoggedIn),
            (AuthState::LoggedIn, AuthState::Refreshing),
            (AuthState::Refreshing, AuthState::LoggedIn),
            (AuthState::LoggedIn, AuthState::LoggedOut),
        ]
    );
}

#[tokio::test]
async fn test_listener_callbacks_receive_the_user() {
    let (client, _, _) = setup();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let handle = client.auth().add_auth_listener(move |event| {
        let _ = tx.send(event.clone());
    });

    client.auth().login(&Credential::anonymous()).await.unwrap();

    let first = rx.recv().await.unwrap();
    let second = rx.recv().await.unwrap();
    assert_eq!(first.current, AuthState::LoggingIn);
    assert_eq!(second.current, AuthState::LoggedIn);
    assert_eq!(second.user_id.as_deref(), Some("user-1"));
    client.auth().remove_auth_listener(handle);
}

#[tokio::test]
async fn test_user_profile_is_fetched_with_the_session() {
    let (client, _, _) = setup();
    client.auth().login(&Credential::anonymous()).await.unwrap();

    let profile = client.auth().user_profile().await.unwrap();

    assert_eq!(profile.user_type.as_deref(), Some("normal"));
    assert_eq!(profile.identities[0].provider_type, "anon-user");
}

#[tokio::test]
async fn test_scoped_service_calls_carry_the_service_name() {
    let (client, backend, _) = setup();
    client.auth().login(&Credential::anonymous()).await.unwrap();

    let _: Value = client
        .service("http1")
        .call_function("echo", vec![json!({ "url": "https://example.com" })])
        .await
        .unwrap();

    let requests = backend.requests.lock().unwrap();
    let call = requests.last().unwrap();
    let body = ejson::parse(call.body.as_deref().unwrap(), Mode::Relaxed).unwrap();
    assert_eq!(body["service"], json!("http1"));
    assert_eq!(body["arguments"][0]["url"], json!("https://example.com"));
}

#[tokio::test]
async fn test_abandoned_login_returns_to_logged_out() {
    let (client, backend, _) = setup();
    let mut events = client.auth().subscribe();
    backend.slow_login.store(true, Ordering::SeqCst);

    let attempt = tokio::time::timeout(
        Duration::from_millis(20),
        client.auth().login(&Credential::anonymous()),
    )
    .await;

    assert!(attempt.is_err());
    assert_eq!(client.auth().state(), AuthState::LoggedOut);
    assert!(!client.auth().is_logged_in());
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push((event.previous, event.current));
    }
    assert_eq!(
        seen,
        vec![
            (AuthState::LoggedOut, AuthState::LoggingIn),
            (AuthState::LoggingIn, AuthState::LoggedOut),
        ]
    );

    backend.slow_login.store(false, Ordering::SeqCst);
    client.auth().login(&Credential::anonymous()).await.unwrap();
    assert_eq!(client.auth().state(), AuthState::LoggedIn);
}

/// Accepts reads but fails every write.
struct ReadOnlyStorage;

impl Storage for ReadOnlyStorage {
    fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(None)
    }

    fn set(&self, key: &str, _value: &[u8]) -> Result<(), StorageError> {
        Err(StorageError::Write {
            key: key.to_string(),
            message: "read-only".to_string(),
        })
    }

    fn remove(&self, _key: &str) -> Result<(), StorageError> {
        Ok(())
    }
}

#[tokio::test]
async fn test_storage_failure_is_reported_after_the_transition() {
    let backend = Arc::new(FakeBackend::default());
    let config = AppClientConfig::new(
        "https://stitch.test",
        backend.clone(),
        Arc::new(ReadOnlyStorage),
    )
    .unwrap();
    let client = AppClient::new(AppId::new(APP_ID).unwrap(), config).unwrap();

    let err = client
        .auth()
        .login(&Credential::anonymous())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Storage(StorageError::Write { .. })));
    assert!(client.auth().is_logged_in());
    assert_eq!(client.auth().state(), AuthState::LoggedIn);
    let before = client.auth().auth_info().unwrap();

    let err = client.auth().refresh().await.unwrap_err();
    assert!(matches!(err, Error::Storage(StorageError::Write { .. })));
    let after = client.auth().auth_info().unwrap();
    assert_ne!(after.access_token, before.access_token);
    assert_eq!(client.auth().state(), AuthState::LoggedIn);
}

#[tokio::test]
async fn test_expired_request_is_not_retried_as_another_user() {
    let (client, backend, _) = setup();
    client.auth().login(&Credential::anonymous()).await.unwrap();
    let gate = Arc::new(Notify::new());
    *backend.call_gate.lock().unwrap() = Some(gate.clone());

    let pending = tokio::spawn({
        let client = client.clone();
        async move { client.call_function::<i64>("echo", vec![json!(1)]).await }
    });
    while backend.function_calls.load(Ordering::SeqCst) == 0 {
        tokio::task::yield_now().await;
    }
    backend.call_gate.lock().unwrap().take();

    client.auth().logout().await.unwrap();
    *backend.next_user.lock().unwrap() = Some("user-2".to_string());
    client.auth().login(&Credential::anonymous()).await.unwrap();
    gate.notify_one();

    let err = pending.await.unwrap().unwrap_err();
    assert!(err.is_invalid_session());
    assert_eq!(backend.function_calls.load(Ordering::SeqCst), 1);
    assert_eq!(backend.refreshes.load(Ordering::SeqCst), 0);
    assert_eq!(client.auth().user_id().as_deref(), Some("user-2"));
}
