use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    app::state::AppState,
    config::GlobalConfig,
    routes::{
        event::sse_handler,
        health::health_check,
        lifecycle::report_lifecycle,
        session::{activate_session, get_current_session, restart_session, stop_session},
    },
};

#[derive(Clone)]
pub struct AppContext {
    pub state: AppState,
    pub config: GlobalConfig,
}

#[derive(OpenApi)]
#[openapi(
    info(title = "Smart Attend Session Guard API", version = "1.0.0"),
    paths(
        crate::routes::health::health_check,
        crate::routes::event::sse_handler,
        crate::routes::session::activate_session,
        crate::routes::session::get_current_session,
        crate::routes::session::restart_session,
        crate::routes::session::stop_session,
        crate::routes::lifecycle::report_lifecycle,
    ),
    components(schemas(
        crate::models::responses::ApiResponse,
        crate::models::requests::ActivateSessionRequest,
        crate::models::requests::LifecycleRequest,
        crate::models::requests::LifecyclePhase,
        crate::models::session::SessionKind,
    ))
)]
struct ApiDoc;

pub fn create_api_router(context: AppContext) -> Router {
    let origins = context
        .config
        .server
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {}", origin);
                None
            }
        })
        .collect::<Vec<_>>();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::CACHE_CONTROL,
        ]);

    Router::new()
        .route("/health", get(health_check))
        .route("/events", get(sse_handler))
        .route("/sessions", post(activate_session))
        .route("/sessions/current", get(get_current_session))
        .route("/sessions/current/restart", post(restart_session))
        .route("/sessions/current/stop", post(stop_session))
        .route("/lifecycle", post(report_lifecycle))
        .merge(SwaggerUi::new("/swagger-ui").url("/docs/openapi.json", ApiDoc::openapi()))
        .layer(cors)
        .with_state(context)
}
