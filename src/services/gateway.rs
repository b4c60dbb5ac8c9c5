use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::{
    error::GatewayError,
    models::session::{Session, SessionKind},
};

/// Backend side of a session. Retries are the caller's business.
///
/// `mark_ended` must be idempotent: ending an already ended session is a
/// success and changes nothing.
#[async_trait]
pub trait RemoteSessionGateway: Send + Sync {
    async fn mark_active(&self, session: &Session) -> Result<(), GatewayError>;
    async fn mark_ended(&self, session: &Session) -> Result<(), GatewayError>;
}

/// One `activeSessions/{group}` document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActiveSessionDoc {
    pub date: String,
    pub is_active: bool,
    pub is_extra: bool,
    pub room: String,
    pub session_id: String,
    pub subject: String,
    pub kind: SessionKind,
}

impl ActiveSessionDoc {
    pub fn from_session(session: &Session) -> Self {
        Self {
            date: session.scheduled_date.clone(),
            is_active: true,
            is_extra: session.is_supplementary,
            room: session.room.clone(),
            session_id: session.session_id.clone(),
            subject: session.subject.clone(),
            kind: session.kind,
        }
    }
}

/// Backend kept in process memory, with the same document semantics as the
/// hosted one. Used when no remote project is configured.
#[derive(Clone, Default)]
pub struct InMemoryGateway {
    active_sessions: Arc<DashMap<String, ActiveSessionDoc>>,
    counters: Arc<DashMap<(String, String, SessionKind), u32>>,
    unreachable: Arc<AtomicBool>,
    end_writes: Arc<AtomicU64>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub fn document(&self, group: &str) -> Option<ActiveSessionDoc> {
        self.active_sessions.get(group).map(|doc| doc.clone())
    }

    /// Sessions held by `subject` for `group` of the given kind.
    pub fn counter(&self, subject: &str, group: &str, kind: SessionKind) -> u32 {
        self.counters
            .get(&(subject.to_string(), group.to_string(), kind))
            .map(|c| *c)
            .unwrap_or(0)
    }

    pub fn end_writes(&self) -> u64 {
        self.end_writes.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), GatewayError> {
        if self.unreachable.load(Ordering::SeqCst) {
            Err(GatewayError::Unreachable("in-memory backend offline".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteSessionGateway for InMemoryGateway {
    async fn mark_active(&self, session: &Session) -> Result<(), GatewayError> {
        self.check()?;

        let doc = ActiveSessionDoc::from_session(session);
        for group in &session.groups {
            self.active_sessions.insert(group.clone(), doc.clone());

            for kind in SessionKind::ALL {
                let mut counter = self
                    .counters
                    .entry((session.subject.clone(), group.clone(), kind))
                    .or_insert(0);
                if kind == session.kind {
                    *counter += 1;
                }
            }
        }

        tracing::debug!(
            "Marked session {} active for {} group(s)",
            session.short_id(),
            session.groups.len()
        );
        Ok(())
    }

    async fn mark_ended(&self, session: &Session) -> Result<(), GatewayError> {
        self.check()?;
        self.end_writes.fetch_add(1, Ordering::SeqCst);

        for group in &session.groups {
            if let Some(mut doc) = self.active_sessions.get_mut(group) {
                doc.is_active = false;
            }
        }

        tracing::debug!("Marked session {} ended", session.short_id());
        Ok(())
    }
}
