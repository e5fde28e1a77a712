//! Service-level handlers

use axum::{http::StatusCode, response::IntoResponse};

/// GET|HEAD / - Health check
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
