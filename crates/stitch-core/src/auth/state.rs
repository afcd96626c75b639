//! Auth states and listener notification.

use std::fmt;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::warn;

const EVENT_BUFFER: usize = 64;

/// Where the auth state machine currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthState {
    LoggedOut,
    LoggingIn,
    LoggedIn,
    Refreshing,
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AuthState::LoggedOut => "logged out",
            AuthState::LoggingIn => "logging in",
            AuthState::LoggedIn => "logged in",
            AuthState::Refreshing => "refreshing",
        };
        f.write_str(s)
    }
}

/// A committed auth state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEvent {
    pub previous: AuthState,
    pub current: AuthState,
    /// The user of the session after the transition, if any.
    pub user_id: Option<String>,
}

/// Handle to a registered auth listener.
///
/// Dropping the handle leaves the listener registered; call
/// [`ListenerHandle::remove`] to unregister it.
#[must_use = "a listener can only be removed through its handle"]
#[derive(Debug)]
pub struct ListenerHandle {
    task: JoinHandle<()>,
}

impl ListenerHandle {
    /// Stop delivering events to the listener.
    pub fn remove(self) {
        self.task.abort();
    }
}

/// Fan-out of auth events to listeners.
#[derive(Debug)]
pub(crate) struct Listeners {
    sender: broadcast::Sender<AuthEvent>,
}

impl Listeners {
    pub(crate) fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_BUFFER);
        Self { sender }
    }

    /// Publish an event. Never blocks.
    pub(crate) fn notify(&self, event: AuthEvent) {
        // Sending only fails when nobody is listening.
        let _ = self.sender.send(event);
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.sender.subscribe()
    }

    /// Run `listener` on a task for every event published from now on.
    ///
    /// Must be called from within a tokio runtime.
    pub(crate) fn add<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(&AuthEvent) + Send + Sync + 'static,
    {
        let mut receiver = self.sender.subscribe();
        let task = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => listener(&event),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Auth listener fell behind, events dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
        ListenerHandle { task }
    }
}
