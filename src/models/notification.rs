use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const SESSION_END_REMINDER: &str = "session_end_guaranteed";
pub const SESSION_ONGOING: &str = "session_ongoing";
pub const SESSION_OUTCOME: &str = "session_outcome";

pub fn auto_end_identifier(session_id: &str) -> String {
    format!("auto_end_{}", session_id)
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Passive,
    Active,
    TimeSensitive,
    Critical,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationCategory {
    Reminder,
    Progress,
    Outcome,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Notification {
    pub identifier: String,
    pub title: String,
    pub body: String,
    pub delay: Duration,
    pub severity: Severity,
    pub category: NotificationCategory,
}

impl Notification {
    pub fn new(
        identifier: impl Into<String>,
        title: impl Into<String>,
        body: impl Into<String>,
        severity: Severity,
        category: NotificationCategory,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            title: title.into(),
            body: body.into(),
            delay: Duration::ZERO,
            severity,
            category,
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}
