use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{channel, Receiver, Sender};

use crate::models::{
    notification::{NotificationCategory, Severity},
    state::{FinalizeTrigger, Outcome},
};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum AppEvent {
    SessionActivated {
        session_id: String,
        end_time: DateTime<Utc>,
    },
    SessionRestarted {
        session_id: String,
        end_time: DateTime<Utc>,
    },
    CountdownTick {
        session_id: String,
        remaining_secs: i64,
    },
    SessionExpired {
        session_id: String,
    },
    SessionResumed {
        session_id: String,
        remaining_secs: i64,
    },
    LifecycleCheckpoint {
        session_id: String,
        observed_at: DateTime<Utc>,
    },
    FinalizeStarted {
        session_id: String,
        trigger: FinalizeTrigger,
        max_attempts: u32,
    },
    FinalizeAttemptFailed {
        session_id: String,
        attempt: u32,
        max_attempts: u32,
        error: String,
    },
    SessionFinalized {
        session_id: String,
        trigger: FinalizeTrigger,
        outcome: Outcome,
    },
    PersistenceFailed {
        error: String,
    },
    NotificationDelivered {
        identifier: String,
        title: String,
        body: String,
        severity: Severity,
        category: NotificationCategory,
    },
}

impl AppEvent {
    /// SSE event name, matching the serialized `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            AppEvent::SessionActivated { .. } => "SessionActivated",
            AppEvent::SessionRestarted { .. } => "SessionRestarted",
            AppEvent::CountdownTick { .. } => "CountdownTick",
            AppEvent::SessionExpired { .. } => "SessionExpired",
            AppEvent::SessionResumed { .. } => "SessionResumed",
            AppEvent::LifecycleCheckpoint { .. } => "LifecycleCheckpoint",
            AppEvent::FinalizeStarted { .. } => "FinalizeStarted",
            AppEvent::FinalizeAttemptFailed { .. } => "FinalizeAttemptFailed",
            AppEvent::SessionFinalized { .. } => "SessionFinalized",
            AppEvent::PersistenceFailed { .. } => "PersistenceFailed",
            AppEvent::NotificationDelivered { .. } => "NotificationDelivered",
        }
    }
}

#[derive(Clone)]
pub struct EventBroadcaster {
    sender: Sender<AppEvent>,
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBroadcaster {
    pub fn new() -> Self {
        let (sender, _) = channel(1024);
        Self { sender }
    }

    pub fn broadcast(&self, event: AppEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> Receiver<AppEvent> {
        self.sender.subscribe()
    }
}
