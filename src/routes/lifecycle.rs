use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;

use crate::{
    app::api::AppContext,
    managers::lifecycle::LifecycleEvent,
    models::{requests::LifecycleRequest, responses::ApiResponse},
};

/// Host shells report process transitions here. Handling is queued on the
/// lifecycle monitor, so the call returns before recovery has run.
#[utoipa::path(
    post,
    path = "/lifecycle",
    tag = "Lifecycle",
    request_body = LifecycleRequest,
    responses(
        (status = 202, description = "Lifecycle event queued", body = ApiResponse),
    )
)]
pub async fn report_lifecycle(
    State(context): State<AppContext>,
    Json(request): Json<LifecycleRequest>,
) -> impl IntoResponse {
    let event = LifecycleEvent::from(request.phase);
    context.state.lifecycle.notify(event);

    let response = ApiResponse::success(
        "Lifecycle event queued.".to_string(),
        json!({ "event": event.to_string() }),
    )
    .with_code(202);

    (StatusCode::ACCEPTED, Json(response)).into_response()
}
