use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use dashmap::{mapref::entry::Entry, DashMap};
use tokio::task::AbortHandle;

use crate::{
    events::{AppEvent, EventBroadcaster},
    models::notification::{Notification, Severity},
};

/// Fire-and-forget user notifications. Nothing here reports delivery.
pub trait NotificationSink: Send + Sync {
    /// Schedules `notification` after its delay, replacing any pending one
    /// with the same identifier.
    fn schedule(&self, notification: Notification);
    fn cancel(&self, identifier: &str);
    fn cancel_all(&self);
}

struct PendingNotification {
    generation: u64,
    handle: AbortHandle,
}

/// In-process scheduler. A delivered notification is logged and published
/// on the event bus for whatever UI is listening.
#[derive(Clone)]
pub struct NotificationCenter {
    pending: Arc<DashMap<String, PendingNotification>>,
    generation: Arc<AtomicU64>,
    events: EventBroadcaster,
}

impl NotificationCenter {
    pub fn new(events: EventBroadcaster) -> Self {
        Self {
            pending: Arc::new(DashMap::new()),
            generation: Arc::new(AtomicU64::new(0)),
            events,
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, identifier: &str) -> bool {
        self.pending.contains_key(identifier)
    }
}

impl NotificationSink for NotificationCenter {
    fn schedule(&self, notification: Notification) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst);
        let pending = self.pending.clone();
        let events = self.events.clone();

        // Holding the slot while spawning keeps a zero-delay delivery from
        // removing its entry before it has been inserted.
        let slot = self.pending.entry(notification.identifier.clone());

        let task = tokio::spawn(async move {
            if !notification.delay.is_zero() {
                tokio::time::sleep(notification.delay).await;
            }

            match notification.severity {
                Severity::Critical | Severity::TimeSensitive => tracing::warn!(
                    "Notification [{}] {}: {}",
                    notification.identifier,
                    notification.title,
                    notification.body
                ),
                Severity::Passive | Severity::Active => tracing::info!(
                    "Notification [{}] {}: {}",
                    notification.identifier,
                    notification.title,
                    notification.body
                ),
            }

            pending.remove_if(&notification.identifier, |_, p| p.generation == generation);

            events.broadcast(AppEvent::NotificationDelivered {
                identifier: notification.identifier,
                title: notification.title,
                body: notification.body,
                severity: notification.severity,
                category: notification.category,
            });
        });

        let entry = PendingNotification {
            generation,
            handle: task.abort_handle(),
        };

        match slot {
            Entry::Occupied(mut occupied) => occupied.insert(entry).handle.abort(),
            Entry::Vacant(vacant) => {
                vacant.insert(entry);
            }
        }
    }

    fn cancel(&self, identifier: &str) {
        if let Some((_, previous)) = self.pending.remove(identifier) {
            previous.handle.abort();
            tracing::debug!("Cancelled pending notification {}", identifier);
        }
    }

    fn cancel_all(&self) {
        let identifiers: Vec<String> = self.pending.iter().map(|e| e.key().clone()).collect();
        for identifier in identifiers {
            self.cancel(&identifier);
        }
    }
}
