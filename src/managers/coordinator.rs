use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::{
    sync::{broadcast::Receiver, Mutex},
    task::JoinHandle,
};

use crate::{
    config::GuardSettings,
    error::{GuardError, PersistenceError},
    events::{AppEvent, EventBroadcaster},
    managers::{
        countdown::{CountdownEngine, Tick},
        lifecycle::{LifecycleEvent, SuspendReason},
        store::SessionStore,
    },
    models::{
        notification::{
            auto_end_identifier, Notification, NotificationCategory, Severity,
            SESSION_END_REMINDER, SESSION_ONGOING,
        },
        record::SessionRecord,
        responses::SessionStatus,
        session::{Session, SessionDraft},
        state::{FinalizeTrigger, GuardState, Outcome},
    },
    services::{
        gateway::RemoteSessionGateway,
        notifier::NotificationSink,
        termination::{RetryPolicy, TerminationExecutor},
    },
    utils::{clock::Clock, time_fmt},
};

struct CoordinatorInner {
    state: GuardState,
    countdown: CountdownEngine,
    record: Option<SessionRecord>,
}

struct FinalizeTicket {
    record: SessionRecord,
    trigger: FinalizeTrigger,
    policy: RetryPolicy,
}

/// Owns the `Idle -> Active -> Finalizing -> Idle` lifecycle of the one
/// session that may be in flight.
///
/// Every mutation goes through a single mutex, so the countdown tick and a
/// resume check that both notice the same expiry are resolved by the
/// `Finalizing` state: whoever gets there second finds nothing to do.
#[derive(Clone)]
pub struct RecoveryCoordinator {
    inner: Arc<Mutex<CoordinatorInner>>,
    store: Arc<dyn SessionStore>,
    gateway: Arc<dyn RemoteSessionGateway>,
    notifier: Arc<dyn NotificationSink>,
    executor: TerminationExecutor,
    events: EventBroadcaster,
    clock: Clock,
    settings: GuardSettings,
}

impl RecoveryCoordinator {
    pub fn new(
        settings: GuardSettings,
        clock: Clock,
        store: Arc<dyn SessionStore>,
        gateway: Arc<dyn RemoteSessionGateway>,
        notifier: Arc<dyn NotificationSink>,
        events: EventBroadcaster,
    ) -> Self {
        let executor = TerminationExecutor::new(
            gateway.clone(),
            store.clone(),
            notifier.clone(),
            events.clone(),
        );

        Self {
            inner: Arc::new(Mutex::new(CoordinatorInner {
                state: GuardState::Idle,
                countdown: CountdownEngine::new(clock.clone(), store.clone()),
                record: None,
            })),
            store,
            gateway,
            notifier,
            executor,
            events,
            clock,
            settings,
        }
    }

    pub async fn activate(&self, draft: SessionDraft) -> Result<Session, GuardError> {
        draft.validate()?;

        let mut inner = self.inner.lock().await;
        reject_unless_idle(&inner)?;

        if let Some(existing) = self.load_record().await? {
            if existing.is_in_flight() {
                return Err(GuardError::SessionInFlight(existing.session.session_id));
            }
        }

        let session = Session::new(draft, self.clock.today())?;
        let record = inner
            .countdown
            .start(&session, self.settings.session_duration)
            .await?;

        if let Err(e) = self.gateway.mark_active(&session).await {
            tracing::warn!("Activation of session {} rejected: {}", session.short_id(), e);
            if let Err(clear_err) = inner.countdown.stop().await {
                tracing::error!(
                    "Could not clear rejected session {}: {}",
                    session.short_id(),
                    clear_err
                );
            }
            return Err(GuardError::ActivationRejected {
                session_id: session.session_id,
                source: e,
            });
        }

        inner.state = GuardState::Active;
        inner.record = Some(record.clone());

        self.schedule_reminder(&record, self.clock.now());
        self.schedule_progress(&record, self.clock.now());

        self.events.broadcast(AppEvent::SessionActivated {
            session_id: session.session_id.clone(),
            end_time: record.end_time,
        });

        tracing::info!(
            "Session {} activated for {} group(s) - {} {} in {}, ends at {}",
            session.short_id(),
            session.groups.len(),
            session.subject,
            session.kind.as_str(),
            session.room,
            record.end_time
        );

        Ok(session)
    }

    /// Gives the in-flight session a fresh deadline.
    pub async fn restart(&self) -> Result<Session, GuardError> {
        let mut inner = self.inner.lock().await;
        let session = match (inner.state, inner.record.as_ref()) {
            (GuardState::Active, Some(record)) => record.session.clone(),
            (GuardState::Finalizing, Some(record)) => {
                return Err(GuardError::AlreadyFinalizing(record.session.session_id.clone()))
            }
            _ => return Err(GuardError::NoActiveSession),
        };

        let record = inner
            .countdown
            .restart(&session, self.settings.session_duration)
            .await?;
        inner.record = Some(record.clone());

        self.schedule_reminder(&record, self.clock.now());

        self.events.broadcast(AppEvent::SessionRestarted {
            session_id: session.session_id.clone(),
            end_time: record.end_time,
        });
        tracing::info!(
            "Session {} restarted - now ends at {}",
            session.short_id(),
            record.end_time
        );

        Ok(session)
    }

    /// Manual end. Goes through the same executor as an expiry.
    ///
    /// The finalize runs on its own task, so dropping the returned future
    /// (a caller that gave up waiting) does not interrupt it.
    pub async fn stop(&self) -> Result<Outcome, GuardError> {
        let ticket = {
            let mut inner = self.inner.lock().await;
            reject_unless_active(&inner)?;
            self.begin_finalize(&mut inner, FinalizeTrigger::Manual, self.settings.immediate_policy)
                .await
        };

        let ticket = ticket.ok_or(GuardError::NoActiveSession)?;
        let max_attempts = ticket.policy.max_attempts;

        match self.spawn_finalize(ticket).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                tracing::error!("Finalize task for manual stop failed: {}", e);
                reset(&mut *self.inner.lock().await);
                Ok(Outcome::Failed {
                    attempts: max_attempts,
                })
            }
        }
    }

    /// Display-rate recomputation. Starts finalization when the deadline has
    /// passed; the returned handle resolves to its outcome.
    pub async fn tick(&self) -> Option<JoinHandle<Outcome>> {
        let mut inner = self.inner.lock().await;
        if inner.state != GuardState::Active {
            return None;
        }

        let tick = inner.countdown.tick();
        match tick {
            Tick::Idle => None,
            Tick::Running { remaining } => {
                if let Some(record) = &inner.record {
                    self.events.broadcast(AppEvent::CountdownTick {
                        session_id: record.session.session_id.clone(),
                        remaining_secs: remaining.num_seconds(),
                    });
                }
                None
            }
            Tick::Expired => {
                tracing::info!("Countdown reached zero - finalizing session");
                let ticket = self
                    .begin_finalize(&mut inner, FinalizeTrigger::Expired, self.settings.immediate_policy)
                    .await?;
                drop(inner);
                Some(self.spawn_finalize(ticket))
            }
        }
    }

    pub async fn handle_lifecycle(
        &self,
        event: LifecycleEvent,
    ) -> Result<Option<JoinHandle<Outcome>>, GuardError> {
        match event {
            LifecycleEvent::Suspending(reason) => self.checkpoint(reason).await,
            LifecycleEvent::Resumed | LifecycleEvent::Launch => self.recover(event).await,
        }
    }

    async fn checkpoint(
        &self,
        reason: SuspendReason,
    ) -> Result<Option<JoinHandle<Outcome>>, GuardError> {
        let mut inner = self.inner.lock().await;
        if inner.state != GuardState::Active {
            return Ok(None);
        }
        let Some(mut record) = inner.record.clone() else {
            return Ok(None);
        };

        let now = self.clock.now();
        if record.is_expired_at(now) {
            tracing::info!(
                "Session {} expired before suspension - ending immediately",
                record.session.short_id()
            );
            let ticket = self
                .begin_finalize(&mut inner, FinalizeTrigger::Recovered, self.settings.recovery_policy)
                .await;
            drop(inner);
            return Ok(ticket.map(|t| self.spawn_finalize(t)));
        }

        record.checkpoint(now);
        self.store.save(&record).await?;
        inner.record = Some(record.clone());

        let remaining = record.remaining_at(now);
        self.notifier.schedule(
            Notification::new(
                auto_end_identifier(&record.session.session_id),
                "Smart Attend - Session Auto-Ended",
                "Your teaching session has ended automatically while the app was in the background.",
                Severity::Critical,
                NotificationCategory::Reminder,
            )
            .after(remaining.to_std().unwrap_or_default()),
        );
        self.schedule_progress(&record, now);

        self.events.broadcast(AppEvent::LifecycleCheckpoint {
            session_id: record.session.session_id.clone(),
            observed_at: now,
        });

        tracing::info!(
            "Suspending ({:?}) with active session {} - {} remaining",
            reason,
            record.session.short_id(),
            time_fmt::format_remaining(remaining)
        );

        Ok(None)
    }

    async fn recover(
        &self,
        event: LifecycleEvent,
    ) -> Result<Option<JoinHandle<Outcome>>, GuardError> {
        let mut inner = self.inner.lock().await;
        if inner.state == GuardState::Finalizing {
            tracing::debug!("{} while finalizing - nothing to recover", event);
            return Ok(None);
        }

        let now = self.clock.now();
        let Some(record) = self.load_record().await? else {
            if inner.state == GuardState::Active {
                tracing::warn!("Persisted session vanished - dropping in-memory session");
                reset(&mut inner);
            } else {
                tracing::info!("No active session found on {}", event);
            }
            return Ok(None);
        };

        if !record.is_in_flight() {
            tracing::warn!(
                "Discarding stale record for ended session {}",
                record.session.short_id()
            );
            self.store.clear().await?;
            reset(&mut inner);
            return Ok(None);
        }

        tracing::info!(
            "Session {} last observed active {}s ago ({})",
            record.session.short_id(),
            (now - record.last_observed_active).num_seconds(),
            event
        );

        inner.state = GuardState::Active;
        inner.record = Some(record.clone());

        if record.finalizing || record.is_expired_at(now) {
            tracing::info!(
                "Session {} missed its deadline at {} - ending now",
                record.session.short_id(),
                record.end_time
            );
            let ticket = self
                .begin_finalize(&mut inner, FinalizeTrigger::Recovered, self.settings.recovery_policy)
                .await;
            drop(inner);
            return Ok(ticket.map(|t| self.spawn_finalize(t)));
        }

        inner.countdown.resume(&record);
        self.notifier.cancel(SESSION_ONGOING);
        self.notifier
            .cancel(&auto_end_identifier(&record.session.session_id));
        self.schedule_reminder(&record, now);

        let remaining = record.remaining_at(now);
        self.events.broadcast(AppEvent::SessionResumed {
            session_id: record.session.session_id.clone(),
            remaining_secs: remaining.num_seconds(),
        });
        tracing::info!(
            "Session {} still valid - {} remaining",
            record.session.short_id(),
            time_fmt::format_remaining(remaining)
        );

        Ok(None)
    }

    /// Loads the persisted record. An unreadable record is reported, moved
    /// out of the way and treated as absent; it cannot be finalized anyway.
    async fn load_record(&self) -> Result<Option<SessionRecord>, GuardError> {
        match self.store.load().await {
            Ok(record) => Ok(record),
            Err(PersistenceError::Corrupt(e)) => {
                tracing::error!("Persisted session record is unreadable: {}", e);
                self.events.broadcast(AppEvent::PersistenceFailed {
                    error: format!("persisted session record is corrupt: {}", e),
                });
                self.store.discard_corrupt().await?;
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Moves `Active` to `Finalizing`. The `finalizing` flag is persisted
    /// first so a process killed mid-finalize retries on the next launch.
    async fn begin_finalize(
        &self,
        inner: &mut CoordinatorInner,
        trigger: FinalizeTrigger,
        policy: RetryPolicy,
    ) -> Option<FinalizeTicket> {
        if inner.state != GuardState::Active {
            return None;
        }
        let mut record = inner.record.clone()?;

        record.finalizing = true;
        if let Err(e) = self.store.save(&record).await {
            tracing::error!(
                "Could not persist finalizing flag for session {}: {}",
                record.session.short_id(),
                e
            );
            self.events.broadcast(AppEvent::PersistenceFailed {
                error: e.to_string(),
            });
        }

        inner.countdown.disarm();
        inner.state = GuardState::Finalizing;
        inner.record = Some(record.clone());

        if trigger == FinalizeTrigger::Expired {
            self.events.broadcast(AppEvent::SessionExpired {
                session_id: record.session.session_id.clone(),
            });
        }
        self.events.broadcast(AppEvent::FinalizeStarted {
            session_id: record.session.session_id.clone(),
            trigger,
            max_attempts: policy.max_attempts,
        });

        Some(FinalizeTicket {
            record,
            trigger,
            policy,
        })
    }

    async fn complete_finalize(&self, ticket: FinalizeTicket) -> Outcome {
        let session = &ticket.record.session;
        let outcome = self
            .executor
            .finalize(session, ticket.policy, ticket.trigger)
            .await;

        {
            let mut inner = self.inner.lock().await;
            reset(&mut inner);
        }

        self.events.broadcast(AppEvent::SessionFinalized {
            session_id: session.session_id.clone(),
            trigger: ticket.trigger,
            outcome,
        });
        tracing::info!(
            "Session {} finalized ({:?}) - {:?}",
            session.short_id(),
            ticket.trigger,
            outcome
        );

        outcome
    }

    fn spawn_finalize(&self, ticket: FinalizeTicket) -> JoinHandle<Outcome> {
        let coordinator = self.clone();
        tokio::spawn(async move { coordinator.complete_finalize(ticket).await })
    }

    fn schedule_reminder(&self, record: &SessionRecord, now: DateTime<Utc>) {
        let minutes = (record.duration_secs + 59) / 60;
        self.notifier.schedule(
            Notification::new(
                SESSION_END_REMINDER,
                "Smart Attend - Session Ended",
                format!("Your {}-minute teaching session has reached its end time.", minutes),
                Severity::TimeSensitive,
                NotificationCategory::Reminder,
            )
            .after(record.remaining_at(now).to_std().unwrap_or_default()),
        );
    }

    fn schedule_progress(&self, record: &SessionRecord, now: DateTime<Utc>) {
        self.notifier.schedule(Notification::new(
            SESSION_ONGOING,
            "Smart Attend - Session Active",
            format!(
                "Teaching session in progress - {} remaining",
                time_fmt::format_remaining(record.remaining_at(now))
            ),
            Severity::Passive,
            NotificationCategory::Progress,
        ));
    }

    pub async fn state(&self) -> GuardState {
        self.inner.lock().await.state
    }

    pub async fn is_active(&self) -> bool {
        self.state().await == GuardState::Active
    }

    pub async fn current_remaining(&self) -> Duration {
        self.inner.lock().await.countdown.remaining()
    }

    pub async fn current_session(&self) -> Option<Session> {
        self.inner
            .lock()
            .await
            .record
            .as_ref()
            .map(|r| r.session.clone())
    }

    pub async fn status(&self) -> SessionStatus {
        let inner = self.inner.lock().await;
        let remaining = inner.countdown.remaining();

        SessionStatus {
            state: inner.state,
            is_active: inner.state == GuardState::Active,
            session: inner.record.as_ref().map(|r| r.session.clone()),
            end_time: inner.record.as_ref().map(|r| r.end_time),
            remaining_secs: remaining.num_seconds(),
            remaining_formatted: time_fmt::format_remaining(remaining),
            progress: inner.countdown.progress(),
        }
    }

    pub fn subscribe(&self) -> Receiver<AppEvent> {
        self.events.subscribe()
    }

    pub fn settings(&self) -> &GuardSettings {
        &self.settings
    }
}

fn reset(inner: &mut CoordinatorInner) {
    inner.countdown.disarm();
    inner.state = GuardState::Idle;
    inner.record = None;
}

fn reject_unless_idle(inner: &CoordinatorInner) -> Result<(), GuardError> {
    match (inner.state, inner.record.as_ref()) {
        (GuardState::Idle, _) => Ok(()),
        (GuardState::Finalizing, Some(record)) => {
            Err(GuardError::AlreadyFinalizing(record.session.session_id.clone()))
        }
        (_, Some(record)) => Err(GuardError::SessionInFlight(record.session.session_id.clone())),
        (_, None) => Err(GuardError::SessionInFlight(String::new())),
    }
}

fn reject_unless_active(inner: &CoordinatorInner) -> Result<(), GuardError> {
    match (inner.state, inner.record.as_ref()) {
        (GuardState::Active, Some(_)) => Ok(()),
        (GuardState::Finalizing, Some(record)) => {
            Err(GuardError::AlreadyFinalizing(record.session.session_id.clone()))
        }
        _ => Err(GuardError::NoActiveSession),
    }
}
