use std::sync::Arc;

use crate::{
    config::{GlobalConfig, GuardSettings},
    events::EventBroadcaster,
    managers::{
        coordinator::RecoveryCoordinator,
        lifecycle::{LifecycleMonitor, LifecycleReceiver},
        store::{FileSessionStore, SessionStore},
    },
    services::{
        firestore::FirestoreGateway,
        gateway::{InMemoryGateway, RemoteSessionGateway},
        notifier::{NotificationCenter, NotificationSink},
    },
    utils::clock::Clock,
};

/// Long-lived services shared by the HTTP layer and the background loops.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: RecoveryCoordinator,
    pub lifecycle: LifecycleMonitor,
    pub events: EventBroadcaster,
}

impl AppState {
    pub fn new(
        coordinator: RecoveryCoordinator,
        lifecycle: LifecycleMonitor,
        events: EventBroadcaster,
    ) -> Self {
        Self {
            coordinator,
            lifecycle,
            events,
        }
    }

    /// Wires the production services described by `config`. The returned
    /// receiver must be handed to `LifecycleMonitor::run`.
    pub fn from_config(config: &GlobalConfig) -> anyhow::Result<(Self, LifecycleReceiver)> {
        let events = EventBroadcaster::new();

        let store: Arc<dyn SessionStore> = Arc::new(FileSessionStore::new(
            config.storage.session_store_path.clone(),
        ));

        let gateway: Arc<dyn RemoteSessionGateway> = match &config.gateway.firestore_project_id {
            Some(project_id) => {
                tracing::info!("Using Firestore project {}", project_id);
                Arc::new(FirestoreGateway::new(
                    config.gateway.firestore_base_url.clone(),
                    project_id.clone(),
                    config.gateway.auth_token.clone(),
                    std::time::Duration::from_millis(config.gateway.timeout_ms),
                )?)
            }
            None => {
                tracing::warn!("FIRESTORE_PROJECT_ID not set - using in-memory backend");
                Arc::new(InMemoryGateway::new())
            }
        };

        let notifier: Arc<dyn NotificationSink> = Arc::new(NotificationCenter::new(events.clone()));

        let coordinator = RecoveryCoordinator::new(
            GuardSettings::from(config),
            Clock::system(),
            store,
            gateway,
            notifier,
            events.clone(),
        );

        let (lifecycle, receiver) = LifecycleMonitor::channel();

        Ok((Self::new(coordinator, lifecycle, events), receiver))
    }
}
