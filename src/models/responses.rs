use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::{
    error::GuardError,
    models::{session::Session, state::GuardState},
};

#[derive(Deserialize, Serialize, ToSchema)]
pub struct ApiResponse {
    success: bool,
    message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,

    #[schema(example = 200)]
    code: u32,
}

impl ApiResponse {
    pub fn success(message: String, data: Value) -> Self {
        Self {
            success: true,
            message,
            data: { if data.is_null() { None } else { Some(data) } },
            code: 200,
        }
    }

    pub fn with_code(mut self, code: u32) -> Self {
        self.code = code;
        self
    }

    pub fn failure(message: impl Into<String>, code: u32) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            code,
        }
    }

    pub fn from_error(error: &GuardError) -> (StatusCode, Self) {
        let status = match error {
            GuardError::InvalidSession(_) => StatusCode::BAD_REQUEST,
            GuardError::NoActiveSession => StatusCode::NOT_FOUND,
            GuardError::SessionInFlight(_)
            | GuardError::AlreadyFinalizing(_)
            | GuardError::CountdownRunning => StatusCode::CONFLICT,
            GuardError::ActivationRejected { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Self::failure(error.to_string(), status.as_u16() as u32))
    }
}

/// Snapshot of the guard for the UI layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatus {
    pub state: GuardState,
    pub is_active: bool,
    pub session: Option<Session>,
    pub end_time: Option<DateTime<Utc>>,
    pub remaining_secs: i64,
    pub remaining_formatted: String,
    pub progress: f64,
}
