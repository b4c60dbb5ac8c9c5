use serde::Deserialize;
use utoipa::ToSchema;

use crate::{
    managers::lifecycle::{LifecycleEvent, SuspendReason},
    models::session::{SessionDraft, SessionKind},
};

#[derive(Deserialize, ToSchema)]
pub struct ActivateSessionRequest {
    pub groups: Vec<String>,
    pub subject: String,
    pub room: String,
    pub kind: SessionKind,
    #[serde(default)]
    pub is_supplementary: bool,
}

impl From<ActivateSessionRequest> for SessionDraft {
    fn from(req: ActivateSessionRequest) -> Self {
        SessionDraft {
            groups: req.groups,
            subject: req.subject,
            room: req.room,
            kind: req.kind,
            is_supplementary: req.is_supplementary,
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    Background,
    Terminating,
    Foreground,
    Launch,
}

#[derive(Deserialize, ToSchema)]
pub struct LifecycleRequest {
    pub phase: LifecyclePhase,
}

impl From<LifecyclePhase> for LifecycleEvent {
    fn from(phase: LifecyclePhase) -> Self {
        match phase {
            LifecyclePhase::Background => LifecycleEvent::Suspending(SuspendReason::Background),
            LifecyclePhase::Terminating => LifecycleEvent::Suspending(SuspendReason::Terminating),
            LifecyclePhase::Foreground => LifecycleEvent::Resumed,
            LifecyclePhase::Launch => LifecycleEvent::Launch,
        }
    }
}
