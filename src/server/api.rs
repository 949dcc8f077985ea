//! API route definitions

use std::sync::Arc;
use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::{gateway, handlers, state::AppState, ServiceKind};

async fn handle_404() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": true,
            "message": "Not found. Visit / to check service status.",
        })),
    )
}

async fn handle_405() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({
            "error": true,
            "message": "Method not allowed.",
        })),
    )
}

/// Router for the given service
pub fn create_router(kind: ServiceKind, state: Arc<AppState>) -> Router {
    match kind {
        ServiceKind::Trainer => create_trainer_router(state),
        ServiceKind::Predictor => create_predictor_router(state),
        ServiceKind::Gateway => create_gateway_router(state),
    }
}

pub fn create_trainer_router(state: Arc<AppState>) -> Router {
    let routes = Router::new()
        .route("/", get(handlers::trainer_status))
        .route("/train", post(handlers::train));
    finish(routes, state)
}

pub fn create_predictor_router(state: Arc<AppState>) -> Router {
    let routes = Router::new()
        .route("/", get(handlers::predictor_status))
        .route("/predict", post(handlers::predict));
    finish(routes, state)
}

pub fn create_gateway_router(state: Arc<AppState>) -> Router {
    let routes = Router::new()
        .route("/", get(gateway::gateway_status))
        .route("/train", post(gateway::forward_train))
        .route("/predict", post(gateway::forward_predict));
    finish(routes, state)
}

/// Shared fallbacks and middleware
fn finish(routes: Router<Arc<AppState>>, state: Arc<AppState>) -> Router {
    let max_upload_size = state.config.max_upload_size;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    routes
        .fallback(handle_404)
        .method_not_allowed_fallback(handle_405)
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_upload_size))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
