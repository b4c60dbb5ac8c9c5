use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::models::session::Session;

/// Durable mirror of the in-flight session and its deadline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionRecord {
    pub session: Session,
    pub end_time: DateTime<Utc>,
    pub duration_secs: i64,
    pub last_observed_active: DateTime<Utc>,
    #[serde(default)]
    pub finalizing: bool,
}

impl SessionRecord {
    pub fn new(session: Session, now: DateTime<Utc>, duration: Duration) -> Self {
        Self {
            session,
            end_time: now + duration,
            duration_secs: duration.num_seconds(),
            last_observed_active: now,
            finalizing: false,
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.session.active
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.end_time
    }

    pub fn remaining_at(&self, now: DateTime<Utc>) -> Duration {
        (self.end_time - now).max(Duration::zero())
    }

    pub fn duration(&self) -> Duration {
        Duration::seconds(self.duration_secs)
    }

    pub fn checkpoint(&mut self, now: DateTime<Utc>) {
        self.last_observed_active = now;
    }
}
