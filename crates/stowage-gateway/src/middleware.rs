//! HTTP middleware for authentication, rate limiting, etc.

use crate::auth::authorize;
use crate::error::REQUEST_ID_HEADER;
use crate::{ApiError, AppState, GatewayErrorCode};
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use governor::{state::keyed::DefaultKeyedStateStore, Quota, RateLimiter};
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;

/// Rate limiter type
pub type KeyedRateLimiter =
    RateLimiter<String, DefaultKeyedStateStore<String>, governor::clock::DefaultClock>;

/// Create a rate limiter; a zero rate is treated as one request per second
pub fn create_rate_limiter(requests_per_second: u32) -> Arc<KeyedRateLimiter> {
    let rps = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
    Arc::new(RateLimiter::keyed(Quota::per_second(rps)))
}

/// Authentication middleware
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    if state.config.auth_enabled() {
        let expected = state.config.auth_token.as_deref().unwrap_or_default();
        let auth_header = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok());
        authorize(auth_header, expected)?;
    }
    Ok(next.run(request).await)
}

/// Rate limiting middleware, keyed by client address
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<KeyedRateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "anonymous".to_string());

    if limiter.check_key(&client).is_err() {
        return Err(ApiError::gateway(
            GatewayErrorCode::SlowDown,
            "Please reduce your request rate",
        ));
    }

    Ok(next.run(request).await)
}

tokio::task_local! {
    static CURRENT_REQUEST_ID: RequestId;
}

/// Id of the request being served on this task, if any
pub fn current_request_id() -> Option<String> {
    CURRENT_REQUEST_ID.try_with(|id| id.0.clone()).ok()
}

/// Request ID middleware - assigns the id seen by logging and error bodies,
/// and adds an x-request-id header unless the response already carries one
pub async fn request_id_middleware(mut request: Request<Body>, next: Next) -> Response {
    let request_id = RequestId(uuid::Uuid::new_v4().to_string());
    request.extensions_mut().insert(request_id.clone());

    let mut response = CURRENT_REQUEST_ID
        .scope(request_id.clone(), next.run(request))
        .await;
    let RequestId(request_id) = request_id;
    if !response.headers().contains_key(REQUEST_ID_HEADER) {
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }
    }
    response
}

/// Request ID extension
#[derive(Clone, Debug)]
pub struct RequestId(pub String);

/// Logging middleware
pub async fn logging_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default();
    let start = std::time::Instant::now();

    let response = next.run(request).await;

    tracing::info!(
        method = %method,
        uri = %uri,
        status = %response.status().as_u16(),
        duration_ms = %start.elapsed().as_millis(),
        request_id = %request_id,
        "Request completed"
    );

    response
}
