use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::{
    error::GuardError,
    managers::store::SessionStore,
    models::{record::SessionRecord, session::Session},
    utils::{clock::Clock, time_fmt},
};

#[derive(Debug, Clone, Copy, PartialEq)]
struct Countdown {
    end_time: DateTime<Utc>,
    duration: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tick {
    Idle,
    Running { remaining: Duration },
    Expired,
}

/// Owns the deadline of the current session.
///
/// `remaining` is always derived from `end_time - now`, so a suspended
/// process that never ticked still sees the right value when it wakes up.
/// Ticks exist for display only; `Tick::Expired` is reported once and the
/// engine disarms itself.
pub struct CountdownEngine {
    clock: Clock,
    store: Arc<dyn SessionStore>,
    armed: Option<Countdown>,
}

impl CountdownEngine {
    pub fn new(clock: Clock, store: Arc<dyn SessionStore>) -> Self {
        Self {
            clock,
            store,
            armed: None,
        }
    }

    /// Computes the deadline, persists it, then arms.
    pub async fn start(
        &mut self,
        session: &Session,
        duration: Duration,
    ) -> Result<SessionRecord, GuardError> {
        if self.armed.is_some() {
            return Err(GuardError::CountdownRunning);
        }

        let record = SessionRecord::new(session.clone(), self.clock.now(), duration);
        self.store.save(&record).await?;

        self.armed = Some(Countdown {
            end_time: record.end_time,
            duration,
        });

        tracing::info!(
            "Countdown started for session {} - ends at {}",
            session.short_id(),
            record.end_time
        );

        Ok(record)
    }

    /// Disarms and erases the persisted deadline. Safe to call repeatedly.
    pub async fn stop(&mut self) -> Result<(), GuardError> {
        if self.armed.take().is_some() {
            tracing::info!("Countdown stopped");
        }
        self.store.clear().await?;
        Ok(())
    }

    /// New deadline for the same session. The fresh record overwrites the old
    /// one, so the store never goes empty in between.
    pub async fn restart(
        &mut self,
        session: &Session,
        duration: Duration,
    ) -> Result<SessionRecord, GuardError> {
        let previous = self.armed.take();

        match self.start(session, duration).await {
            Ok(record) => Ok(record),
            Err(e) => {
                self.armed = previous;
                Err(e)
            }
        }
    }

    /// Re-arms from a persisted record without moving its deadline.
    pub fn resume(&mut self, record: &SessionRecord) {
        self.armed = Some(Countdown {
            end_time: record.end_time,
            duration: record.duration(),
        });
    }

    /// Forgets the in-memory deadline but leaves the persisted record alone.
    pub fn disarm(&mut self) {
        self.armed = None;
    }

    pub fn tick(&mut self) -> Tick {
        let Some(countdown) = self.armed else {
            return Tick::Idle;
        };

        let remaining = countdown.end_time - self.clock.now();
        if remaining <= Duration::zero() {
            self.armed = None;
            Tick::Expired
        } else {
            Tick::Running { remaining }
        }
    }

    pub fn remaining(&self) -> Duration {
        self.armed
            .map(|c| (c.end_time - self.clock.now()).max(Duration::zero()))
            .unwrap_or_else(Duration::zero)
    }

    pub fn progress(&self) -> f64 {
        self.armed
            .map(|c| time_fmt::progress(c.duration, self.remaining()))
            .unwrap_or(0.0)
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.armed.map(|c| c.end_time)
    }

    pub fn is_running(&self) -> bool {
        self.armed.is_some()
    }
}
