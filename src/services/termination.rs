use std::{sync::Arc, time::Duration};

use crate::{
    events::{AppEvent, EventBroadcaster},
    managers::store::SessionStore,
    models::{
        notification::{
            auto_end_identifier, Notification, NotificationCategory, Severity,
            SESSION_END_REMINDER, SESSION_ONGOING, SESSION_OUTCOME,
        },
        session::Session,
        state::{FinalizeTrigger, Outcome},
    },
    services::{gateway::RemoteSessionGateway, notifier::NotificationSink},
};

/// Attempt budget and the fixed pause between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    /// A budget of zero is bumped to one attempt.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }
}

/// Records that a session has ended, remotely with bounded retries and
/// locally without conditions.
///
/// Whatever the backend does, `finalize` clears the persisted record, drops
/// the session's pending reminders and schedules exactly one outcome
/// notification before returning.
#[derive(Clone)]
pub struct TerminationExecutor {
    gateway: Arc<dyn RemoteSessionGateway>,
    store: Arc<dyn SessionStore>,
    notifier: Arc<dyn NotificationSink>,
    events: EventBroadcaster,
}

impl TerminationExecutor {
    pub fn new(
        gateway: Arc<dyn RemoteSessionGateway>,
        store: Arc<dyn SessionStore>,
        notifier: Arc<dyn NotificationSink>,
        events: EventBroadcaster,
    ) -> Self {
        Self {
            gateway,
            store,
            notifier,
            events,
        }
    }

    pub async fn finalize(
        &self,
        session: &Session,
        policy: RetryPolicy,
        trigger: FinalizeTrigger,
    ) -> Outcome {
        let mut ended = session.clone();
        ended.mark_ended();

        let outcome = self.end_remotely(&ended, policy).await;

        if let Err(e) = self.store.clear().await {
            tracing::error!(
                "Could not clear persisted session {}: {}",
                session.short_id(),
                e
            );
            self.events.broadcast(AppEvent::PersistenceFailed {
                error: e.to_string(),
            });
        }

        self.notifier.cancel(SESSION_END_REMINDER);
        self.notifier.cancel(SESSION_ONGOING);
        self.notifier.cancel(&auto_end_identifier(&session.session_id));
        self.notifier.schedule(outcome_notification(outcome, trigger));

        outcome
    }

    async fn end_remotely(&self, session: &Session, policy: RetryPolicy) -> Outcome {
        for attempt in 1..=policy.max_attempts {
            match self.gateway.mark_ended(session).await {
                Ok(()) => {
                    tracing::info!(
                        "Session {} ended remotely on attempt {}/{}",
                        session.short_id(),
                        attempt,
                        policy.max_attempts
                    );
                    return Outcome::Success { attempts: attempt };
                }
                Err(e) => {
                    tracing::warn!(
                        "End attempt {}/{} for session {} failed: {}",
                        attempt,
                        policy.max_attempts,
                        session.short_id(),
                        e
                    );
                    self.events.broadcast(AppEvent::FinalizeAttemptFailed {
                        session_id: session.session_id.clone(),
                        attempt,
                        max_attempts: policy.max_attempts,
                        error: e.to_string(),
                    });

                    if attempt < policy.max_attempts && !policy.delay.is_zero() {
                        tokio::time::sleep(policy.delay).await;
                    }
                }
            }
        }

        tracing::error!(
            "All {} end attempts for session {} failed - manual check required",
            policy.max_attempts,
            session.short_id()
        );
        Outcome::Failed {
            attempts: policy.max_attempts,
        }
    }
}

fn outcome_notification(outcome: Outcome, trigger: FinalizeTrigger) -> Notification {
    let (title, body, severity) = match (outcome, trigger) {
        (Outcome::Success { .. }, FinalizeTrigger::Manual) => (
            "Smart Attend - Session Ended",
            "Session ended successfully.",
            Severity::Active,
        ),
        (Outcome::Success { .. }, FinalizeTrigger::Expired) => (
            "Smart Attend - Session Ended",
            "Your teaching session has ended automatically.",
            Severity::TimeSensitive,
        ),
        (Outcome::Success { .. }, FinalizeTrigger::Recovered) => (
            "Smart Attend - Session Recovered",
            "Your session was ended after the app recovered. The attendance backend has been updated.",
            Severity::Active,
        ),
        (Outcome::Failed { .. }, _) => (
            "Smart Attend - Manual Check Required",
            "The session could not be marked as ended. Please check the attendance backend manually.",
            Severity::Critical,
        ),
    };

    Notification::new(
        SESSION_OUTCOME,
        title,
        body,
        severity,
        NotificationCategory::Outcome,
    )
}
