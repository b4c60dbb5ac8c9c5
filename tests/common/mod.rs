#![allow(dead_code)]

use std::{
    sync::{
        atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Duration as StdDuration,
};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use smart_attend_guard::{
    config::GuardSettings,
    error::GatewayError,
    events::EventBroadcaster,
    managers::{coordinator::RecoveryCoordinator, store::MemorySessionStore},
    models::{
        notification::{Notification, NotificationCategory},
        session::{Session, SessionDraft, SessionKind},
    },
    services::{
        gateway::RemoteSessionGateway, notifier::NotificationSink, termination::RetryPolicy,
    },
    utils::clock::Clock,
};

/// Backend double whose first `failing_ends` end writes fail.
#[derive(Default)]
pub struct ScriptedGateway {
    failing_ends: AtomicU32,
    reject_activation: AtomicBool,
    end_calls: AtomicU32,
    active_calls: AtomicU32,
    end_delay_ms: AtomicU64,
}

impl ScriptedGateway {
    pub fn failing(failing_ends: u32) -> Self {
        Self {
            failing_ends: AtomicU32::new(failing_ends),
            ..Default::default()
        }
    }

    /// Every end write takes `delay` before answering.
    pub fn with_end_delay(self, delay: StdDuration) -> Self {
        self.end_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
        self
    }

    pub fn reject_activation(&self) {
        self.reject_activation.store(true, Ordering::SeqCst);
    }

    pub fn reset_activation(&self) {
        self.reject_activation.store(false, Ordering::SeqCst);
    }

    pub fn end_calls(&self) -> u32 {
        self.end_calls.load(Ordering::SeqCst)
    }

    pub fn active_calls(&self) -> u32 {
        self.active_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteSessionGateway for ScriptedGateway {
    async fn mark_active(&self, _session: &Session) -> Result<(), GatewayError> {
        self.active_calls.fetch_add(1, Ordering::SeqCst);
        if self.reject_activation.load(Ordering::SeqCst) {
            return Err(GatewayError::Rejected {
                status: 403,
                message: "permission denied".to_string(),
            });
        }
        Ok(())
    }

    async fn mark_ended(&self, session: &Session) -> Result<(), GatewayError> {
        assert!(!session.active, "end writes must carry an inactive session");
        self.end_calls.fetch_add(1, Ordering::SeqCst);

        let delay_ms = self.end_delay_ms.load(Ordering::SeqCst);
        if delay_ms > 0 {
            tokio::time::sleep(StdDuration::from_millis(delay_ms)).await;
        }

        let remaining = self.failing_ends.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_ends.store(remaining - 1, Ordering::SeqCst);
            return Err(GatewayError::Unreachable("network down".to_string()));
        }
        Ok(())
    }
}

/// Captures every scheduled notification instead of delivering it.
#[derive(Default)]
pub struct RecordingNotifier {
    scheduled: Mutex<Vec<Notification>>,
    cancelled: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn scheduled(&self) -> Vec<Notification> {
        self.scheduled.lock().unwrap().clone()
    }

    pub fn outcomes(&self) -> Vec<Notification> {
        self.scheduled()
            .into_iter()
            .filter(|n| n.category == NotificationCategory::Outcome)
            .collect()
    }

    pub fn last_scheduled(&self, identifier: &str) -> Option<Notification> {
        self.scheduled()
            .into_iter()
            .rev()
            .find(|n| n.identifier == identifier)
    }

    pub fn was_cancelled(&self, identifier: &str) -> bool {
        self.cancelled.lock().unwrap().iter().any(|c| c == identifier)
    }
}

impl NotificationSink for RecordingNotifier {
    fn schedule(&self, notification: Notification) {
        self.scheduled.lock().unwrap().push(notification);
    }

    fn cancel(&self, identifier: &str) {
        self.cancelled.lock().unwrap().push(identifier.to_string());
    }

    fn cancel_all(&self) {
        self.cancelled.lock().unwrap().push("*".to_string());
    }
}

pub fn t0() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(1_760_000_000, 0).unwrap()
}

pub fn settings() -> GuardSettings {
    GuardSettings {
        session_duration: Duration::seconds(300),
        immediate_policy: RetryPolicy::new(5, StdDuration::ZERO),
        recovery_policy: RetryPolicy::new(3, StdDuration::ZERO),
    }
}

pub fn draft() -> SessionDraft {
    SessionDraft {
        groups: vec!["CSE-2A".to_string(), "CSE-2B".to_string()],
        subject: "Operating Systems".to_string(),
        room: "LT-1".to_string(),
        kind: SessionKind::Lecture,
        is_supplementary: false,
    }
}

/// One "device": a clock, a durable store and a backend that outlive any
/// single coordinator.
pub struct Harness {
    pub clock: Clock,
    pub store: MemorySessionStore,
    pub gateway: Arc<ScriptedGateway>,
    pub notifier: Arc<RecordingNotifier>,
    pub events: EventBroadcaster,
    pub coordinator: RecoveryCoordinator,
}

impl Harness {
    pub fn new(gateway: ScriptedGateway) -> Self {
        let clock = Clock::manual(t0());
        let store = MemorySessionStore::new();
        let gateway = Arc::new(gateway);
        let notifier = Arc::new(RecordingNotifier::default());
        let events = EventBroadcaster::new();

        let coordinator = build(&clock, &store, &gateway, &notifier, &events);

        Self {
            clock,
            store,
            gateway,
            notifier,
            events,
            coordinator,
        }
    }

    pub fn healthy() -> Self {
        Self::new(ScriptedGateway::default())
    }

    /// A fresh coordinator on the same store, as after the process was killed.
    pub fn relaunch(&mut self) {
        self.coordinator = build(
            &self.clock,
            &self.store,
            &self.gateway,
            &self.notifier,
            &self.events,
        );
    }
}

fn build(
    clock: &Clock,
    store: &MemorySessionStore,
    gateway: &Arc<ScriptedGateway>,
    notifier: &Arc<RecordingNotifier>,
    events: &EventBroadcaster,
) -> RecoveryCoordinator {
    RecoveryCoordinator::new(
        settings(),
        clock.clone(),
        Arc::new(store.clone()),
        gateway.clone(),
        notifier.clone(),
        events.clone(),
    )
}
