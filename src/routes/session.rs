use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;

use crate::{
    app::api::AppContext,
    models::{requests::ActivateSessionRequest, responses::ApiResponse, session::SessionDraft},
};

fn error_response(error: &crate::error::GuardError) -> axum::response::Response {
    let (status, body) = ApiResponse::from_error(error);
    (status, Json(body)).into_response()
}

#[utoipa::path(
    post,
    path = "/sessions",
    tag = "Session",
    request_body = ActivateSessionRequest,
    responses(
        (status = 200, description = "Session activated", body = ApiResponse),
        (status = 400, description = "Invalid session details", body = ApiResponse),
        (status = 409, description = "A session is already in flight", body = ApiResponse),
        (status = 502, description = "Backend rejected the activation", body = ApiResponse),
    )
)]
pub async fn activate_session(
    State(context): State<AppContext>,
    Json(request): Json<ActivateSessionRequest>,
) -> impl IntoResponse {
    let coordinator = &context.state.coordinator;

    match coordinator.activate(SessionDraft::from(request)).await {
        Ok(session) => {
            let status = coordinator.status().await;
            let data = json!({
                "session": session,
                "end_time": status.end_time,
                "remaining": status.remaining_formatted,
            });

            (
                StatusCode::OK,
                Json(ApiResponse::success("Session activated.".to_string(), data)),
            )
                .into_response()
        }
        Err(e) => {
            tracing::warn!("Activation failed: {}", e);
            error_response(&e)
        }
    }
}

#[utoipa::path(
    get,
    path = "/sessions/current",
    tag = "Session",
    responses(
        (status = 200, description = "Current guard status", body = ApiResponse),
    )
)]
pub async fn get_current_session(State(context): State<AppContext>) -> impl IntoResponse {
    let status = context.state.coordinator.status().await;

    (
        StatusCode::OK,
        Json(ApiResponse::success(
            "Current session status.".to_string(),
            json!(status),
        )),
    )
        .into_response()
}

#[utoipa::path(
    post,
    path = "/sessions/current/restart",
    tag = "Session",
    responses(
        (status = 200, description = "Countdown restarted", body = ApiResponse),
        (status = 404, description = "No active session", body = ApiResponse),
        (status = 409, description = "Session is being finalized", body = ApiResponse),
    )
)]
pub async fn restart_session(State(context): State<AppContext>) -> impl IntoResponse {
    let coordinator = &context.state.coordinator;

    match coordinator.restart().await {
        Ok(session) => {
            let status = coordinator.status().await;
            let data = json!({
                "session_id": session.session_id,
                "end_time": status.end_time,
                "remaining": status.remaining_formatted,
            });

            (
                StatusCode::OK,
                Json(ApiResponse::success("Session restarted.".to_string(), data)),
            )
                .into_response()
        }
        Err(e) => error_response(&e),
    }
}

#[utoipa::path(
    post,
    path = "/sessions/current/stop",
    tag = "Session",
    responses(
        (status = 200, description = "Session ended", body = ApiResponse),
        (status = 404, description = "No active session", body = ApiResponse),
        (status = 409, description = "Session is already being finalized", body = ApiResponse),
        (status = 502, description = "Backend could not be updated", body = ApiResponse),
    )
)]
pub async fn stop_session(State(context): State<AppContext>) -> impl IntoResponse {
    match context.state.coordinator.stop().await {
        Ok(outcome) if outcome.is_success() => (
            StatusCode::OK,
            Json(ApiResponse::success(
                "Session ended.".to_string(),
                json!({ "outcome": outcome }),
            )),
        )
            .into_response(),
        Ok(outcome) => (
            StatusCode::BAD_GATEWAY,
            Json(ApiResponse::failure(
                format!(
                    "Session ended locally but the backend was not updated after {} attempts. Manual check required.",
                    outcome.attempts()
                ),
                502,
            )),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}
