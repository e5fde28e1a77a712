//! Client error types

use serde::Deserialize;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, ClientError>;

/// Client errors
#[derive(Error, Debug)]
pub enum ClientError {
    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The gateway answered with an error body
    #[error("gateway error ({status} {code}): {message}")]
    Gateway {
        status: u16,
        code: String,
        message: String,
        request_id: Option<String>,
    },

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid gateway base URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Deserialize)]
struct ErrorBody {
    code: String,
    message: String,
    request_id: Option<String>,
}

impl ClientError {
    /// Build an error from a non-success response body
    pub fn from_error_body(body: &str, status: u16) -> Self {
        match serde_json::from_str::<ErrorBody>(body) {
            Ok(err) => Self::Gateway {
                status,
                code: err.code,
                message: err.message,
                request_id: err.request_id,
            },
            Err(_) => Self::Gateway {
                status,
                code: format!("HTTP{}", status),
                message: if body.is_empty() {
                    "Unknown error".to_string()
                } else {
                    body.to_string()
                },
                request_id: None,
            },
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Gateway { status: 404, .. })
    }

    /// Check if this is an access denied error
    pub fn is_access_denied(&self) -> bool {
        matches!(self, Self::Gateway { status: 403, .. })
    }
}
