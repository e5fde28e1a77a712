//! Remove and info handlers

use super::FileIdQuery;
use crate::{ApiError, AppState};
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use std::sync::Arc;
use stowage_cluster::FileInfo;

/// POST|DELETE /file/remove?fileId= - Delete a file
pub async fn remove_file(
    State(state): State<Arc<AppState>>,
    query: Result<Query<FileIdQuery>, QueryRejection>,
) -> Result<Json<bool>, ApiError> {
    let Query(query) = query?;
    let removed = state.service.remove(&query.file_id).await?;
    Ok(Json(removed))
}

/// GET /file/info?fileId= - Current file info
pub async fn file_info(
    State(state): State<Arc<AppState>>,
    query: Result<Query<FileIdQuery>, QueryRejection>,
) -> Result<Json<FileInfo>, ApiError> {
    let Query(query) = query?;
    let info = state.service.info(&query.file_id).await?;
    Ok(Json(info))
}
