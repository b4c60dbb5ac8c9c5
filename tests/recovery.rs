mod common;

use std::time::Duration as StdDuration;

use chrono::Duration;

use common::{draft, t0, Harness};
use smart_attend_guard::{
    error::{GuardError, PersistenceError},
    events::AppEvent,
    managers::{
        lifecycle::{LifecycleEvent, SuspendReason},
        store::SessionStore,
    },
    models::{
        notification::{auto_end_identifier, Severity, SESSION_ONGOING},
        record::SessionRecord,
        session::Session,
        state::{FinalizeTrigger, GuardState, Outcome},
    },
};

const BACKGROUND: LifecycleEvent = LifecycleEvent::Suspending(SuspendReason::Background);
const TERMINATING: LifecycleEvent = LifecycleEvent::Suspending(SuspendReason::Terminating);

#[tokio::test]
async fn session_killed_in_background_is_ended_on_next_launch() {
    let mut h = Harness::healthy();
    let session = h.coordinator.activate(draft()).await.unwrap();
    assert!(h.coordinator.is_active().await);
    assert_eq!(h.coordinator.current_remaining().await, Duration::seconds(300));
    h.coordinator.handle_lifecycle(BACKGROUND).await.unwrap();

    h.clock.advance(Duration::minutes(10));
    h.relaunch();

    let finalizing = h
        .coordinator
        .handle_lifecycle(LifecycleEvent::Launch)
        .await
        .unwrap()
        .expect("expired session must be finalized");
    let outcome = finalizing.await.unwrap();

    assert_eq!(outcome, Outcome::Success { attempts: 1 });
    assert_eq!(h.gateway.end_calls(), 1);
    assert!(h.store.load().await.unwrap().is_none());
    assert_eq!(h.coordinator.state().await, GuardState::Idle);
    assert_eq!(h.notifier.outcomes().len(), 1);
    assert!(h.notifier.outcomes()[0].title.contains("Recovered"));
    assert!(h.coordinator.current_session().await.is_none());
    assert!(!session.session_id.is_empty());
}

#[tokio::test]
async fn relaunch_inside_the_window_resumes_with_the_remaining_time() {
    let mut h = Harness::healthy();
    h.coordinator.activate(draft()).await.unwrap();
    h.coordinator.handle_lifecycle(BACKGROUND).await.unwrap();

    h.clock.advance(Duration::seconds(120));
    h.relaunch();

    let started = h
        .coordinator
        .handle_lifecycle(LifecycleEvent::Launch)
        .await
        .unwrap();

    assert!(started.is_none());
    assert_eq!(h.coordinator.state().await, GuardState::Active);
    assert_eq!(h.coordinator.current_remaining().await, Duration::seconds(180));
    assert_eq!(h.gateway.end_calls(), 0);

    let status = h.coordinator.status().await;
    assert_eq!(status.remaining_formatted, "03:00");
    assert!((status.progress - 0.4).abs() < 1e-9);
}

#[tokio::test]
async fn foreground_return_cancels_background_reminders() {
    let h = Harness::healthy();
    let session = h.coordinator.activate(draft()).await.unwrap();
    h.coordinator.handle_lifecycle(BACKGROUND).await.unwrap();

    h.clock.advance(Duration::seconds(30));
    h.coordinator
        .handle_lifecycle(LifecycleEvent::Resumed)
        .await
        .unwrap();

    assert!(h.notifier.was_cancelled(SESSION_ONGOING));
    assert!(h.notifier.was_cancelled(&auto_end_identifier(&session.session_id)));
    assert_eq!(h.coordinator.current_remaining().await, Duration::seconds(270));
}

#[tokio::test]
async fn second_activation_is_rejected_while_a_session_is_in_flight() {
    let mut h = Harness::healthy();
    let first = h.coordinator.activate(draft()).await.unwrap();

    let again = h.coordinator.activate(draft()).await;
    assert!(matches!(again, Err(GuardError::SessionInFlight(id)) if id == first.session_id));

    // A relaunched process that has not recovered yet still sees the record.
    h.relaunch();
    let after_relaunch = h.coordinator.activate(draft()).await;
    assert!(matches!(after_relaunch, Err(GuardError::SessionInFlight(_))));
    assert_eq!(h.gateway.active_calls(), 1);
}

#[tokio::test]
async fn restart_gives_the_same_session_a_fresh_deadline() {
    let h = Harness::healthy();
    let session = h.coordinator.activate(draft()).await.unwrap();

    h.clock.advance(Duration::seconds(100));
    let restarted = h.coordinator.restart().await.unwrap();

    assert_eq!(restarted.session_id, session.session_id);
    assert_eq!(h.coordinator.current_remaining().await, Duration::seconds(300));
    let record = h.store.load().await.unwrap().unwrap();
    assert_eq!(record.end_time, t0() + Duration::seconds(400));
}

#[tokio::test]
async fn expiry_seen_by_resume_and_tick_finalizes_once() {
    let h = Harness::healthy();
    h.coordinator.activate(draft()).await.unwrap();
    h.clock.advance(Duration::seconds(301));

    let from_resume = h
        .coordinator
        .handle_lifecycle(LifecycleEvent::Resumed)
        .await
        .unwrap();
    let from_tick = h.coordinator.tick().await;

    assert!(from_resume.is_some());
    assert!(from_tick.is_none());

    from_resume.unwrap().await.unwrap();
    assert!(h.coordinator.tick().await.is_none());
    assert_eq!(h.gateway.end_calls(), 1);
    assert_eq!(h.notifier.outcomes().len(), 1);
}

#[tokio::test]
async fn suspending_checkpoints_and_schedules_the_auto_end_warning() {
    let h = Harness::healthy();
    let session = h.coordinator.activate(draft()).await.unwrap();

    h.clock.advance(Duration::seconds(60));
    let result = h.coordinator.handle_lifecycle(TERMINATING).await.unwrap();

    assert!(result.is_none());
    assert_eq!(h.coordinator.state().await, GuardState::Active);

    let record = h.store.load().await.unwrap().unwrap();
    assert_eq!(record.last_observed_active, t0() + Duration::seconds(60));
    assert!(!record.finalizing);

    let warning = h
        .notifier
        .last_scheduled(&auto_end_identifier(&session.session_id))
        .unwrap();
    assert_eq!(warning.severity, Severity::Critical);
    assert_eq!(warning.delay, StdDuration::from_secs(240));
}

#[tokio::test]
async fn suspending_after_the_deadline_ends_the_session() {
    let h = Harness::healthy();
    h.coordinator.activate(draft()).await.unwrap();
    h.clock.advance(Duration::seconds(400));

    let finalizing = h
        .coordinator
        .handle_lifecycle(BACKGROUND)
        .await
        .unwrap()
        .expect("deadline already passed");

    assert!(finalizing.await.unwrap().is_success());
    assert!(h.store.load().await.unwrap().is_none());
}

#[tokio::test]
async fn stale_inactive_record_is_discarded_on_launch() {
    let h = Harness::healthy();
    let mut session = Session::new(draft(), "2025-10-09".to_string()).unwrap();
    session.mark_ended();
    h.store
        .save(&SessionRecord::new(session, t0(), Duration::seconds(300)))
        .await
        .unwrap();

    let result = h
        .coordinator
        .handle_lifecycle(LifecycleEvent::Launch)
        .await
        .unwrap();

    assert!(result.is_none());
    assert!(h.store.load().await.unwrap().is_none());
    assert_eq!(h.coordinator.state().await, GuardState::Idle);
    assert_eq!(h.gateway.end_calls(), 0);
}

#[tokio::test]
async fn launch_with_nothing_persisted_stays_idle() {
    let h = Harness::healthy();

    let result = h
        .coordinator
        .handle_lifecycle(LifecycleEvent::Launch)
        .await
        .unwrap();

    assert!(result.is_none());
    assert_eq!(h.coordinator.state().await, GuardState::Idle);
}

#[tokio::test]
async fn interrupted_finalize_is_retried_on_launch() {
    let h = Harness::healthy();
    let mut rx = h.events.subscribe();
    let session = Session::new(draft(), "2025-10-09".to_string()).unwrap();
    let mut record = SessionRecord::new(session, t0(), Duration::seconds(300));
    record.finalizing = true;
    h.store.save(&record).await.unwrap();

    let finalizing = h
        .coordinator
        .handle_lifecycle(LifecycleEvent::Launch)
        .await
        .unwrap()
        .expect("finalizing record must be picked up");
    let outcome = finalizing.await.unwrap();

    assert_eq!(outcome, Outcome::Success { attempts: 1 });
    assert_eq!(h.gateway.end_calls(), 1);

    let mut trigger = None;
    while let Ok(event) = rx.try_recv() {
        if let AppEvent::SessionFinalized { trigger: t, .. } = event {
            trigger = Some(t);
        }
    }
    assert_eq!(trigger, Some(FinalizeTrigger::Recovered));
}

#[tokio::test]
async fn corrupt_record_is_set_aside_on_launch() {
    let h = Harness::healthy();
    let mut rx = h.events.subscribe();
    h.store.write_raw("{ \"session\": ").await;

    let result = h
        .coordinator
        .handle_lifecycle(LifecycleEvent::Launch)
        .await
        .unwrap();

    assert!(result.is_none());
    assert_eq!(h.coordinator.state().await, GuardState::Idle);
    assert!(h.store.load().await.unwrap().is_none());
    assert!(matches!(
        rx.try_recv().unwrap(),
        AppEvent::PersistenceFailed { .. }
    ));
    assert!(h.coordinator.activate(draft()).await.is_ok());
}

#[tokio::test]
async fn corrupt_record_does_not_block_activation() {
    let h = Harness::healthy();
    h.store.write_raw("not a record").await;

    let session = h.coordinator.activate(draft()).await.unwrap();

    assert_eq!(h.gateway.active_calls(), 1);
    let record = h.store.load().await.unwrap().unwrap();
    assert_eq!(record.session.session_id, session.session_id);
}

#[tokio::test]
async fn activation_fails_cleanly_when_storage_is_unavailable() {
    let h = Harness::healthy();
    h.store.set_unavailable(true);

    let result = h.coordinator.activate(draft()).await;

    assert!(matches!(
        result,
        Err(GuardError::Persistence(PersistenceError::Unavailable))
    ));
    assert_eq!(h.gateway.active_calls(), 0);
    assert_eq!(h.coordinator.state().await, GuardState::Idle);
}

#[tokio::test]
async fn rejected_activation_leaves_nothing_behind() {
    let h = Harness::healthy();
    h.gateway.reject_activation();

    let result = h.coordinator.activate(draft()).await;

    assert!(matches!(result, Err(GuardError::ActivationRejected { .. })));
    assert!(h.store.load().await.unwrap().is_none());
    assert_eq!(h.coordinator.state().await, GuardState::Idle);

    h.gateway.reset_activation();
    assert!(h.coordinator.activate(draft()).await.is_ok());
}

#[tokio::test]
async fn invalid_draft_is_rejected_before_anything_is_written() {
    let h = Harness::healthy();
    let mut bad = draft();
    bad.groups.clear();

    let result = h.coordinator.activate(bad).await;

    assert!(matches!(result, Err(GuardError::InvalidSession(_))));
    assert!(h.store.load().await.unwrap().is_none());
}
