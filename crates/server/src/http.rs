//! HTTP router

use axum::{
    extract::State,
    http::HeaderValue,
    routing::get,
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::websocket::WebSocketHandler;

/// Build the application router.
pub fn create_router(state: AppState, metrics_handle: PrometheusHandle) -> Router {
    let cors = build_cors(&state);

    Router::new()
        .route("/health", get(health))
        .route("/sessions", get(sessions))
        .route("/metrics", get(move || async move { metrics_handle.render() }))
        .route("/ws", get(WebSocketHandler::handle))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn build_cors(state: &AppState) -> CorsLayer {
    let origins = state.get_config().server.cors_origins.clone();
    if origins.is_empty() {
        return CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %o, "Skipping unparseable CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "sessions": state.sessions.count(),
    }))
}

async fn sessions(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "count": state.sessions.count(),
        "ids": state.sessions.list(),
    }))
}
