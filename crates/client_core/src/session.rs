//! Authentication state for the lifetime of the application.
//!
//! Three independent writers feed the controller: the initial load, the
//! backend's pushed change stream, and explicit refresh/logout calls. They are
//! not sequenced against each other; whichever completes last determines the
//! visible session. A slow initial load can therefore overwrite a fresher
//! pushed change.

use std::sync::{Arc, Weak};

use shared::domain::Session;
use tokio::{
    sync::{broadcast, broadcast::error::RecvError, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::identity::{IdentityBackend, SessionChange};

pub const LOAD_FAILED_MESSAGE: &str = "Failed to load session";
pub const REFRESH_FAILED_MESSAGE: &str = "Failed to refresh session";
pub const LOGOUT_FAILED_MESSAGE: &str = "Failed to sign out";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Uninitialized,
    Loading,
    Authenticated,
    Unauthenticated,
    Errored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub session: Option<Session>,
    pub error: Option<String>,
}

impl SessionSnapshot {
    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }
}

/// Aborts the change-stream listener when dropped.
struct ChangeSubscription {
    task: JoinHandle<()>,
}

impl Drop for ChangeSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[derive(Default)]
struct SessionState {
    /// Set once any operation has run; `Uninitialized` until then.
    started: bool,
    initialized: bool,
    loading: bool,
    session: Option<Session>,
    error: Option<String>,
    closed: bool,
    subscription: Option<ChangeSubscription>,
}

impl SessionState {
    fn status(&self) -> SessionStatus {
        if !self.started {
            SessionStatus::Uninitialized
        } else if self.loading {
            SessionStatus::Loading
        } else if self.session.is_some() {
            SessionStatus::Authenticated
        } else if self.error.is_some() {
            SessionStatus::Errored
        } else {
            SessionStatus::Unauthenticated
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status(),
            session: self.session.clone(),
            error: self.error.clone(),
        }
    }
}

pub struct SessionController {
    backend: Arc<dyn IdentityBackend>,
    inner: Mutex<SessionState>,
    events: broadcast::Sender<SessionSnapshot>,
}

impl SessionController {
    pub fn new(backend: Arc<dyn IdentityBackend>) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            backend,
            inner: Mutex::new(SessionState::default()),
            events,
        })
    }

    /// Creates the controller and runs [`Self::initialize`] in the background.
    pub fn spawn(backend: Arc<dyn IdentityBackend>) -> Arc<Self> {
        let controller = Self::new(backend);
        let task_controller = Arc::clone(&controller);
        tokio::spawn(async move {
            task_controller.initialize().await;
        });
        controller
    }

    /// Subscribes to the change stream, then loads the current session.
    /// Only the first call has any effect.
    pub async fn initialize(self: &Arc<Self>) -> SessionSnapshot {
        {
            let mut guard = self.inner.lock().await;
            if guard.closed || guard.initialized {
                debug!("session controller already initialized");
                return guard.snapshot();
            }
            guard.initialized = true;
            guard.started = true;
            guard.loading = true;
            guard.subscription = Some(self.spawn_change_listener());
            let snapshot = guard.snapshot();
            drop(guard);
            let _ = self.events.send(snapshot);
        }

        let result = self.backend.current_session().await;
        self.apply(|state| {
            state.loading = false;
            match result {
                Ok(session) => {
                    info!(authenticated = session.is_some(), "session loaded");
                    state.session = session;
                    state.error = None;
                }
                Err(err) => {
                    let message = err.describe(LOAD_FAILED_MESSAGE);
                    warn!(error = %message, "session load failed");
                    state.session = None;
                    state.error = Some(message);
                }
            }
        })
        .await
    }

    pub async fn refresh(&self) -> SessionSnapshot {
        if let Err(snapshot) = self.begin(|state| state.loading = true).await {
            return snapshot;
        }

        let result = self.backend.refresh_session().await;
        self.apply(|state| {
            state.loading = false;
            match result {
                Ok(session) => {
                    debug!(authenticated = session.is_some(), "session refreshed");
                    state.session = session;
                    state.error = None;
                }
                Err(err) => {
                    let message = err.describe(REFRESH_FAILED_MESSAGE);
                    warn!(error = %message, "session refresh failed");
                    state.session = None;
                    state.error = Some(message);
                }
            }
        })
        .await
    }

    /// On failure the current session is kept and only the error is recorded.
    pub async fn logout(&self) -> SessionSnapshot {
        if let Err(snapshot) = self.begin(|_| {}).await {
            return snapshot;
        }
        let result = self.backend.sign_out().await;
        self.apply(|state| match result {
            Ok(()) => {
                info!("signed out");
                state.session = None;
                state.error = None;
            }
            Err(err) => {
                let message = err.describe(LOGOUT_FAILED_MESSAGE);
                warn!(error = %message, "sign out failed");
                state.error = Some(message);
            }
        })
        .await
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.inner.lock().await.snapshot()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.inner.lock().await.session.is_some()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionSnapshot> {
        self.events.subscribe()
    }

    /// Releases the change subscription. Nothing writes to the controller afterwards.
    pub async fn shutdown(&self) {
        let mut guard = self.inner.lock().await;
        guard.closed = true;
        guard.subscription = None;
    }

    async fn apply_change(&self, change: SessionChange) {
        self.apply(|state| {
            debug!(authenticated = change.is_some(), "session change pushed");
            state.session = change;
            state.error = None;
        })
        .await;
    }

    /// Marks the controller started before a backend call. `Err` after shutdown,
    /// in which case the backend is not contacted.
    async fn begin(
        &self,
        update: impl FnOnce(&mut SessionState),
    ) -> Result<SessionSnapshot, SessionSnapshot> {
        let mut guard = self.inner.lock().await;
        if guard.closed {
            return Err(guard.snapshot());
        }
        let before = guard.snapshot();
        guard.started = true;
        update(&mut *guard);
        let snapshot = guard.snapshot();
        drop(guard);
        if snapshot != before {
            let _ = self.events.send(snapshot.clone());
        }
        Ok(snapshot)
    }

    async fn apply(&self, update: impl FnOnce(&mut SessionState)) -> SessionSnapshot {
        let mut guard = self.inner.lock().await;
        if guard.closed {
            return guard.snapshot();
        }
        update(&mut *guard);
        let snapshot = guard.snapshot();
        drop(guard);
        let _ = self.events.send(snapshot.clone());
        snapshot
    }

    fn spawn_change_listener(self: &Arc<Self>) -> ChangeSubscription {
        let mut changes = self.backend.subscribe();
        let controller: Weak<Self> = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            loop {
                let change = match changes.recv().await {
                    Ok(change) => change,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "session change stream lagged");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                let Some(controller) = controller.upgrade() else {
                    break;
                };
                controller.apply_change(change).await;
            }
        });
        ChangeSubscription { task }
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
