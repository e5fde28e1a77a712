//! Error types and gateway error codes

use axum::{
    extract::multipart::{MultipartError, MultipartRejection},
    extract::rejection::QueryRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use crate::middleware::current_request_id;
use stowage_cluster::{ErrorKind, StorageError};
use thiserror::Error;
use tracing::error;

/// Header carrying the request id on every response
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Stable error codes reported to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayErrorCode {
    AccessDenied,
    InvalidToken,
    InvalidArgument,
    InvalidRequest,
    NoSuchFile,
    SlowDown,
    StorageFailure,
    InternalError,
}

impl GatewayErrorCode {
    /// Get the error code string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccessDenied => "AccessDenied",
            Self::InvalidToken => "InvalidToken",
            Self::InvalidArgument => "InvalidArgument",
            Self::InvalidRequest => "InvalidRequest",
            Self::NoSuchFile => "NoSuchFile",
            Self::SlowDown => "SlowDown",
            Self::StorageFailure => "StorageFailure",
            Self::InternalError => "InternalError",
        }
    }

    /// Get the HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::AccessDenied | Self::InvalidToken => StatusCode::FORBIDDEN,
            Self::InvalidArgument | Self::InvalidRequest => StatusCode::BAD_REQUEST,
            Self::NoSuchFile => StatusCode::NOT_FOUND,
            Self::SlowDown => StatusCode::TOO_MANY_REQUESTS,
            Self::StorageFailure => StatusCode::BAD_GATEWAY,
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ErrorKind> for GatewayErrorCode {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::NotFound => Self::NoSuchFile,
            ErrorKind::InvalidInput => Self::InvalidRequest,
            ErrorKind::TransportFailure => Self::StorageFailure,
        }
    }
}

/// Failure of a file operation, as seen by callers of the service.
///
/// Storage causes are logged when the error is built; only the fixed
/// operation message and the error kind travel further.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// The request was rejected before touching storage
    #[error("{0}")]
    Validation(String),

    /// A storage operation failed
    #[error("{message}")]
    Operation {
        message: &'static str,
        kind: ErrorKind,
    },
}

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Log `err` in full and wrap it behind `message`
    pub fn operation(message: &'static str, err: StorageError) -> Self {
        error!(error = %err, source = ?err, "{}", message);
        Self::Operation {
            message,
            kind: err.kind(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::InvalidInput,
            Self::Operation { kind, .. } => *kind,
        }
    }
}

/// API error type
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{message}")]
    Gateway {
        code: GatewayErrorCode,
        message: String,
        request_id: String,
    },

    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl ApiError {
    /// Create a new gateway error tagged with the current request's id
    pub fn gateway(code: GatewayErrorCode, message: impl Into<String>) -> Self {
        Self::Gateway {
            code,
            message: message.into(),
            request_id: request_id_or_new(),
        }
    }

    /// Get the error code
    pub fn error_code(&self) -> GatewayErrorCode {
        match self {
            Self::Gateway { code, .. } => *code,
            Self::Service(ServiceError::Validation(_)) => GatewayErrorCode::InvalidArgument,
            Self::Service(ServiceError::Operation { kind, .. }) => (*kind).into(),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::gateway(GatewayErrorCode::InvalidArgument, rejection.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        Self::gateway(GatewayErrorCode::InvalidRequest, rejection.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        Self::gateway(GatewayErrorCode::InvalidRequest, err.body_text())
    }
}

fn request_id_or_new() -> String {
    current_request_id().unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: String,
    request_id: &'a str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.error_code();
        let request_id = match &self {
            ApiError::Gateway { request_id, .. } => request_id.clone(),
            _ => request_id_or_new(),
        };

        let body = ErrorBody {
            code: code.as_str(),
            message: self.to_string(),
            request_id: &request_id,
        };
        (
            code.status_code(),
            [(REQUEST_ID_HEADER, request_id.as_str())],
            Json(body),
        )
            .into_response()
    }
}
