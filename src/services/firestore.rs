use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::{
    error::GatewayError,
    models::session::{Session, SessionKind},
    services::gateway::RemoteSessionGateway,
};

const ACTIVE_SESSIONS: &str = "activeSessions";
const SUBJECTS: &str = "subjects";

/// Gateway backed by the Firestore REST `documents:commit` endpoint.
///
/// Activation is one atomic commit: an `activeSessions/{group}` document per
/// group plus the per-kind counters under `subjects/{subject}`. Ending only
/// touches `isActive`, which is what makes it safe to repeat.
#[derive(Clone)]
pub struct FirestoreGateway {
    client: reqwest::Client,
    base_url: String,
    project_id: String,
    auth_token: Option<String>,
}

impl FirestoreGateway {
    pub fn new(
        base_url: impl Into<String>,
        project_id: impl Into<String>,
        auth_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            project_id: project_id.into(),
            auth_token,
        })
    }

    fn documents_root(&self) -> String {
        format!("projects/{}/databases/(default)/documents", self.project_id)
    }

    fn document_name(&self, collection: &str, id: &str) -> String {
        format!("{}/{}/{}", self.documents_root(), collection, id)
    }

    pub fn activation_writes(&self, session: &Session) -> Value {
        let mut writes = Vec::new();

        for group in &session.groups {
            writes.push(json!({
                "update": {
                    "name": self.document_name(ACTIVE_SESSIONS, group),
                    "fields": {
                        "date": { "stringValue": session.scheduled_date },
                        "isActive": { "booleanValue": true },
                        "isExtra": { "booleanValue": session.is_supplementary },
                        "room": { "stringValue": session.room },
                        "sessionId": { "stringValue": session.session_id },
                        "subject": { "stringValue": session.subject },
                        "type": { "stringValue": session.kind.as_str() },
                    }
                }
            }));
        }

        // Incrementing by zero creates a missing counter, so every group ends
        // up with all three kinds present.
        let field_transforms: Vec<Value> = session
            .groups
            .iter()
            .flat_map(|group| {
                SessionKind::ALL.iter().map(move |kind| {
                    let step = if *kind == session.kind { "1" } else { "0" };
                    json!({
                        "fieldPath": format!("{}.{}", quote_field(group), kind.as_str()),
                        "increment": { "integerValue": step },
                    })
                })
            })
            .collect();

        writes.push(json!({
            "transform": {
                "document": self.document_name(SUBJECTS, &session.subject),
                "fieldTransforms": field_transforms,
            }
        }));

        Value::Array(writes)
    }

    pub fn end_writes(&self, session: &Session) -> Value {
        Value::Array(
            session
                .groups
                .iter()
                .map(|group| {
                    json!({
                        "update": {
                            "name": self.document_name(ACTIVE_SESSIONS, group),
                            "fields": { "isActive": { "booleanValue": false } }
                        },
                        "updateMask": { "fieldPaths": ["isActive"] }
                    })
                })
                .collect(),
        )
    }

    async fn commit(&self, writes: Value) -> Result<(), GatewayError> {
        let url = format!("{}/{}:commit", self.base_url, self.documents_root());

        let mut request = self.client.post(&url).json(&json!({ "writes": writes }));
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(());
        }

        let message = response
            .text()
            .await
            .unwrap_or_default()
            .chars()
            .take(512)
            .collect();

        Err(GatewayError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl RemoteSessionGateway for FirestoreGateway {
    async fn mark_active(&self, session: &Session) -> Result<(), GatewayError> {
        self.commit(self.activation_writes(session)).await?;
        tracing::info!(
            "Session {} activated in Firestore for {} group(s)",
            session.short_id(),
            session.groups.len()
        );
        Ok(())
    }

    async fn mark_ended(&self, session: &Session) -> Result<(), GatewayError> {
        self.commit(self.end_writes(session)).await?;
        tracing::info!("Session {} ended in Firestore", session.short_id());
        Ok(())
    }
}

/// Quotes a field path segment unless it is a plain identifier.
fn quote_field(segment: &str) -> String {
    let mut chars = segment.chars();
    let simple = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false)
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if simple {
        segment.to_string()
    } else {
        format!("`{}`", segment.replace('\\', "\\\\").replace('`', "\\`"))
    }
}
