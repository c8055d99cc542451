use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::server::handlers::{health, ingest, qa};
use crate::state::AppState;

/// Creates the application router with all routes and middleware.
///
/// This function sets up:
/// - CORS middleware
/// - Health check endpoint
/// - Document ingestion endpoint (multipart upload)
/// - Question answering endpoint
pub fn router(state: Arc<AppState>) -> Router {
    let cors_layer = build_cors_layer(&state);
    let body_limit = DefaultBodyLimit::max(state.settings.server.max_upload_bytes);
    Router::new()
        .route("/health", get(health::health))
        .route("/ingest", post(ingest::ingest))
        .route("/qa", post(qa::qa))
        .layer(body_limit)
        .with_state(state)
        .layer(cors_layer)
        .layer(TraceLayer::new_for_http())
}

fn build_cors_layer(state: &Arc<AppState>) -> CorsLayer {
    let allowed_origins = state
        .settings
        .server
        .cors_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect::<Vec<_>>();

    let allow_origin = if allowed_origins.is_empty() {
        AllowOrigin::list(
            default_local_origins()
                .into_iter()
                .filter_map(|origin| HeaderValue::from_str(&origin).ok())
                .collect::<Vec<_>>(),
        )
    } else {
        AllowOrigin::list(allowed_origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::ACCEPT, header::CONTENT_TYPE])
}

fn default_local_origins() -> Vec<String> {
    vec![
        "http://localhost".to_string(),
        "http://localhost:3000".to_string(),
        "http://localhost:5173".to_string(),
        "http://127.0.0.1".to_string(),
        "http://127.0.0.1:3000".to_string(),
        "http://127.0.0.1:5173".to_string(),
    ]
}
