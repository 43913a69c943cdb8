use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::handlers;
use crate::pipeline::PollPipeline;
use crate::settings::Settings;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<PollPipeline>,
    pub settings: Arc<Settings>,
}

pub fn build_router(state: AppState, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/api/messages", post(handlers::handle_message))
        .route("/api/last-code", get(handlers::get_last_code))
        .route(
            "/api/options",
            get(handlers::get_options).put(handlers::put_options),
        )
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(allowed_origins))
        .with_state(state)
}

/// Only the listed origins are allowed; an empty list allows any origin.
fn build_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<_> = allowed_origins
        .iter()
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    if origins.is_empty() {
        tracing::warn!("No CORS origins configured, using permissive CORS");
        return CorsLayer::permissive();
    }

    tracing::info!("CORS configured for origins: {:?}", origins);
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}
