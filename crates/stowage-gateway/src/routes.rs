//! HTTP route definitions

use crate::{handlers, middleware, AppState};
use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the main router
pub fn create_router(state: Arc<AppState>) -> Router {
    // Create rate limiter
    let rate_limiter = middleware::create_rate_limiter(state.config.rate_limit_rps);

    // CORS configuration
    let cors = if state.config.cors_enabled {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
            .expose_headers(Any)
    } else {
        CorsLayer::new()
    };

    Router::new()
        // File endpoints
        .route("/file/upload", post(handlers::upload_file))
        .route("/file/upload-slave", post(handlers::upload_slave_file))
        .route(
            "/file/upload-slave-prefix",
            post(handlers::upload_slave_file_with_prefix),
        )
        .route(
            "/file/upload-image-thumb",
            post(handlers::upload_image_and_thumbs),
        )
        .route(
            "/file/remove",
            post(handlers::remove_file).delete(handlers::remove_file),
        )
        .route("/file/download", get(handlers::download_file))
        .route("/file/download-range", get(handlers::download_file_range))
        .route("/file/info", get(handlers::file_info))
        .layer(axum_middleware::from_fn_with_state(
            Arc::clone(&state),
            middleware::auth_middleware,
        ))
        // Health check, reachable without credentials
        .route("/", get(handlers::health_check).head(handlers::health_check))
        // Apply middleware
        .layer(axum_middleware::from_fn_with_state(
            rate_limiter,
            middleware::rate_limit_middleware,
        ))
        .layer(axum_middleware::from_fn(middleware::logging_middleware))
        .layer(axum_middleware::from_fn(middleware::request_id_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(state.config.max_body_size))
        .with_state(state)
}
