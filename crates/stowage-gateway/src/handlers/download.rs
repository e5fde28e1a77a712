//! Streaming download handlers

use super::FileIdQuery;
use crate::error::ServiceError;
use crate::service::FileGatewayService;
use crate::{ApiError, AppState, GatewayErrorCode};
use axum::{
    body::Body,
    extract::{rejection::QueryRejection, Query, State},
    http::{header, StatusCode},
    response::Response,
};
use serde::Deserialize;
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use tracing::warn;

/// Size of the in-process pipe between the cluster transfer and the body
const PIPE_CAPACITY: usize = 64 * 1024;

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    #[serde(rename = "fileId", default)]
    pub file_id: String,
    pub start: Option<i64>,
    pub len: Option<i64>,
}

/// Which part of the file a background transfer writes
enum Transfer {
    Whole,
    Range { start: i64, length: i64 },
}

/// Run the cluster transfer on its own task, feeding the returned body.
///
/// When the client goes away the pipe closes, the transfer's next write fails
/// and the task ends with a logged transfer error.
fn spawn_transfer(service: FileGatewayService, file_id: String, transfer: Transfer) -> Body {
    let (reader, mut writer) = tokio::io::duplex(PIPE_CAPACITY);
    tokio::spawn(async move {
        let result = match transfer {
            Transfer::Whole => service.download(&file_id, &mut writer).await,
            Transfer::Range { start, length } => {
                service
                    .download_range(&file_id, start, length, &mut writer)
                    .await
            }
        };
        if let Err(e) = result {
            warn!(file_id = %file_id, error = %e, "Download aborted");
        }
    });
    Body::from_stream(ReaderStream::new(reader))
}

fn content_type(file_id: &str) -> String {
    mime_guess::from_path(file_id)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

fn build_response(builder: axum::http::response::Builder, body: Body) -> Result<Response, ApiError> {
    builder
        .body(body)
        .map_err(|e| ApiError::gateway(GatewayErrorCode::InternalError, e.to_string()))
}

/// GET /file/download?fileId= - Stream a whole file
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    query: Result<Query<FileIdQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    let info = state.service.info(&query.file_id).await?;
    let file_id = query.file_id.trim().to_string();

    let builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type(&file_id))
        .header(header::CONTENT_LENGTH, info.file_size)
        .header(header::ACCEPT_RANGES, "bytes");
    let body = spawn_transfer(state.service.clone(), file_id, Transfer::Whole);
    build_response(builder, body)
}

/// GET /file/download-range?fileId=&start=&len= - Stream part of a file
pub async fn download_file_range(
    State(state): State<Arc<AppState>>,
    query: Result<Query<RangeQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    let start = query
        .start
        .ok_or_else(|| ServiceError::validation("start is required"))?;
    let len = query
        .len
        .ok_or_else(|| ServiceError::validation("len is required"))?;

    let plan = state.service.plan_range(&query.file_id, start, len).await?;
    let file_id = query.file_id.trim().to_string();

    let builder = Response::builder()
        .status(StatusCode::PARTIAL_CONTENT)
        .header(header::CONTENT_TYPE, content_type(&file_id))
        .header(header::CONTENT_LENGTH, plan.length)
        .header(header::CONTENT_RANGE, plan.content_range())
        .header(header::ACCEPT_RANGES, "bytes");
    let body = spawn_transfer(
        state.service.clone(),
        file_id,
        Transfer::Range {
            start: plan.start as i64,
            length: plan.length as i64,
        },
    );
    build_response(builder, body)
}
