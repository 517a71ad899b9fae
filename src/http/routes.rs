use super::handlers;
use super::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Base64 recordings are much larger than the default JSON limit
const RECORDING_BODY_LIMIT: usize = 64 * 1024 * 1024;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Catalog
        .route("/domains", get(handlers::list_domains))
        // Session lifecycle
        .route("/sessions", post(handlers::create_session))
        .route(
            "/sessions/:session_id",
            get(handlers::get_session_status).delete(handlers::cancel_session),
        )
        .route(
            "/sessions/:session_id/question",
            get(handlers::get_current_question),
        )
        .route("/sessions/:session_id/answers", post(handlers::submit_answer))
        .route(
            "/sessions/:session_id/recording",
            post(handlers::upload_recording).layer(DefaultBodyLimit::max(RECORDING_BODY_LIMIT)),
        )
        .route("/sessions/:session_id/previous", post(handlers::go_to_previous))
        .route("/sessions/:session_id/report", get(handlers::get_report))
        // Request logging, and CORS for browser clients
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
