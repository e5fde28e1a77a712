//! Shared bearer token authentication

use crate::{ApiError, GatewayErrorCode};

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .or_else(|| auth_header.strip_prefix("bearer "))
        .map(str::trim)
}

/// Check an Authorization header value against the configured token
pub fn authorize(auth_header: Option<&str>, expected: &str) -> Result<(), ApiError> {
    let header = auth_header
        .ok_or_else(|| ApiError::gateway(GatewayErrorCode::AccessDenied, "Authentication required"))?;
    let token = extract_bearer_token(header).ok_or_else(|| {
        ApiError::gateway(
            GatewayErrorCode::InvalidToken,
            "Invalid Authorization header format",
        )
    })?;
    if !constant_time_eq(token.as_bytes(), expected.as_bytes()) {
        tracing::debug!("Bearer token mismatch");
        return Err(ApiError::gateway(
            GatewayErrorCode::InvalidToken,
            "Invalid token",
        ));
    }
    Ok(())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
