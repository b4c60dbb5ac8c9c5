use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::GuardError;

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, Hash, ToSchema)]
pub enum SessionKind {
    #[serde(rename = "lect")]
    Lecture,
    #[serde(rename = "lab")]
    Lab,
    #[serde(rename = "tut")]
    Tutorial,
}

impl SessionKind {
    pub const ALL: [SessionKind; 3] = [SessionKind::Lecture, SessionKind::Lab, SessionKind::Tutorial];

    /// Key used for the per-kind counters in the backend.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionKind::Lecture => "lect",
            SessionKind::Lab => "lab",
            SessionKind::Tutorial => "tut",
        }
    }
}

/// What the lecturer picked before pressing "activate".
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct SessionDraft {
    pub groups: Vec<String>,
    pub subject: String,
    pub room: String,
    pub kind: SessionKind,
    pub is_supplementary: bool,
}

impl SessionDraft {
    pub fn validate(&self) -> Result<(), GuardError> {
        if self.groups.is_empty() {
            return Err(GuardError::InvalidSession(
                "at least one group is required".to_string(),
            ));
        }
        if self.groups.iter().any(|g| g.trim().is_empty()) {
            return Err(GuardError::InvalidSession(
                "group identifiers must not be blank".to_string(),
            ));
        }
        if self.subject.trim().is_empty() {
            return Err(GuardError::InvalidSession("subject is required".to_string()));
        }
        if self.room.trim().is_empty() {
            return Err(GuardError::InvalidSession("room is required".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub session_id: String,
    pub groups: BTreeSet<String>,
    pub subject: String,
    pub room: String,
    pub kind: SessionKind,
    pub is_supplementary: bool,
    pub scheduled_date: String,
    pub active: bool,
}

impl Session {
    pub fn new(draft: SessionDraft, scheduled_date: String) -> Result<Self, GuardError> {
        draft.validate()?;

        Ok(Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            groups: draft.groups.iter().map(|g| g.trim().to_string()).collect(),
            subject: draft.subject.trim().to_string(),
            room: draft.room.trim().to_string(),
            kind: draft.kind,
            is_supplementary: draft.is_supplementary,
            scheduled_date,
            active: true,
        })
    }

    pub fn mark_ended(&mut self) {
        self.active = false;
    }

    pub fn short_id(&self) -> String {
        self.session_id.chars().take(8).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> SessionDraft {
        SessionDraft {
            groups: vec!["CSE-2A".to_string(), " CSE-2B ".to_string(), "CSE-2A".to_string()],
            subject: "Operating Systems".to_string(),
            room: "LT-101".to_string(),
            kind: SessionKind::Lab,
            is_supplementary: false,
        }
    }

    #[test]
    fn new_session_is_active_with_deduplicated_groups() {
        let session = Session::new(draft(), "2026-10-19".to_string()).unwrap();

        assert!(session.active);
        assert_eq!(session.groups.len(), 2);
        assert!(session.groups.contains("CSE-2B"));
        assert_eq!(session.scheduled_date, "2026-10-19");
        assert_eq!(session.session_id.len(), 36);
    }

    #[test]
    fn sessions_get_distinct_ids() {
        let a = Session::new(draft(), "2026-10-19".to_string()).unwrap();
        let b = Session::new(draft(), "2026-10-19".to_string()).unwrap();
        assert_ne!(a.session_id, b.session_id);
    }

    #[test]
    fn rejects_empty_groups_and_blank_fields() {
        let mut no_groups = draft();
        no_groups.groups.clear();
        assert!(matches!(
            no_groups.validate(),
            Err(GuardError::InvalidSession(_))
        ));

        let mut blank_room = draft();
        blank_room.room = "   ".to_string();
        assert!(blank_room.validate().is_err());

        let mut blank_group = draft();
        blank_group.groups.push(String::new());
        assert!(blank_group.validate().is_err());
    }

    #[test]
    fn kind_uses_short_wire_names() {
        assert_eq!(serde_json::to_string(&SessionKind::Lecture).unwrap(), "\"lect\"");
        let kind: SessionKind = serde_json::from_str("\"tut\"").unwrap();
        assert_eq!(kind, SessionKind::Tutorial);
        assert_eq!(SessionKind::Lab.as_str(), "lab");
    }
}
