//! Transient user notifications with auto-dismiss.

use std::{
    collections::HashMap,
    sync::{Arc, Weak},
    time::Duration,
};

use tokio::sync::{broadcast, Mutex};
use tracing::debug;

use crate::timer::{schedule_after, ScheduledTask};

pub const DEFAULT_NOTIFICATION_TTL: Duration = Duration::from_millis(5000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: u64,
    pub kind: NotificationKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifierEvent {
    Shown(Notification),
    Dismissed { id: u64 },
}

pub struct Notifier {
    ttl: Duration,
    inner: Mutex<NotifierState>,
    events: broadcast::Sender<NotifierEvent>,
}

#[derive(Default)]
struct NotifierState {
    next_id: u64,
    active: Vec<Notification>,
    dismiss_timers: HashMap<u64, ScheduledTask>,
    closed: bool,
}

impl Notifier {
    pub fn new(ttl: Duration) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            ttl,
            inner: Mutex::new(NotifierState::default()),
            events,
        })
    }

    /// Shows a notification and schedules its dismissal. Returns `None` after shutdown.
    pub async fn push(
        self: &Arc<Self>,
        kind: NotificationKind,
        message: impl Into<String>,
    ) -> Option<u64> {
        let mut guard = self.inner.lock().await;
        if guard.closed {
            return None;
        }
        guard.next_id += 1;
        let notification = Notification {
            id: guard.next_id,
            kind,
            message: message.into(),
        };
        let id = notification.id;

        let weak: Weak<Self> = Arc::downgrade(self);
        let timer = schedule_after(self.ttl, async move {
            if let Some(notifier) = weak.upgrade() {
                notifier.dismiss(id).await;
            }
        });
        guard.dismiss_timers.insert(id, timer);
        guard.active.push(notification.clone());
        drop(guard);

        debug!(id, ?kind, "notification shown");
        let _ = self.events.send(NotifierEvent::Shown(notification));
        Some(id)
    }

    pub async fn dismiss(&self, id: u64) -> bool {
        let mut guard = self.inner.lock().await;
        if guard.closed {
            return false;
        }
        let before = guard.active.len();
        guard.active.retain(|notification| notification.id != id);
        let removed = guard.active.len() != before;
        let timer = guard.dismiss_timers.remove(&id);
        drop(guard);
        drop(timer);

        if removed {
            let _ = self.events.send(NotifierEvent::Dismissed { id });
        }
        removed
    }

    pub async fn active(&self) -> Vec<Notification> {
        self.inner.lock().await.active.clone()
    }

    /// Cancels every pending dismissal; later calls become no-ops.
    pub async fn shutdown(&self) {
        let mut guard = self.inner.lock().await;
        guard.closed = true;
        guard.dismiss_timers.clear();
        guard.active.clear();
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NotifierEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
#[path = "tests/notify_tests.rs"]
mod tests;
