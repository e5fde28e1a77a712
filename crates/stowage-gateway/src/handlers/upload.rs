//! Upload handlers

use crate::error::ServiceError;
use crate::service::FileUpload;
use crate::{ApiError, AppState};
use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::QueryRejection,
        Multipart, Query, State,
    },
    Json,
};
use futures::TryStreamExt;
use serde::Deserialize;
use std::sync::Arc;
use stowage_cluster::MasterAndSlave;
use tokio_util::io::StreamReader;

/// Name of the multipart field carrying the file
pub const FILE_FIELD: &str = "file";

#[derive(Debug, Deserialize)]
pub struct SlaveQuery {
    #[serde(rename = "masterFileId", default)]
    pub master_file_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SlavePrefixQuery {
    #[serde(rename = "masterFileId", default)]
    pub master_file_id: String,
    #[serde(rename = "prefixName", default)]
    pub prefix_name: String,
}

#[derive(Debug, Deserialize)]
pub struct ThumbQuery {
    #[serde(rename = "cutSize", default)]
    pub cut_size: String,
}

fn missing_file() -> ApiError {
    ServiceError::validation("file is missing").into()
}

/// Buffer the `file` field of a multipart body
async fn read_file(multipart: &mut Multipart) -> Result<FileUpload, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let data = field.bytes().await?;
        return Ok(FileUpload::new(file_name, data));
    }
    Err(missing_file())
}

/// POST /file/upload - Store a file, returns its id
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<String, ApiError> {
    let upload = read_file(&mut multipart?).await?;
    let id = state.service.upload(upload).await?;
    Ok(id.to_string())
}

/// POST /file/upload-slave?masterFileId= - Store a slave with a generated prefix
pub async fn upload_slave_file(
    State(state): State<Arc<AppState>>,
    query: Result<Query<SlaveQuery>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<String, ApiError> {
    let Query(query) = query?;
    let upload = read_file(&mut multipart?).await?;
    let id = state
        .service
        .upload_slave(&query.master_file_id, upload)
        .await?;
    Ok(id.to_string())
}

/// POST /file/upload-slave-prefix?masterFileId=&prefixName= - Store a slave
/// with a caller-chosen prefix
pub async fn upload_slave_file_with_prefix(
    State(state): State<Arc<AppState>>,
    query: Result<Query<SlavePrefixQuery>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<String, ApiError> {
    let Query(query) = query?;
    let upload = read_file(&mut multipart?).await?;
    let id = state
        .service
        .upload_slave_with_prefix(&query.master_file_id, &query.prefix_name, upload)
        .await?;
    Ok(id.to_string())
}

/// POST /file/upload-image-thumb?cutSize= - Store an image and its thumbnails.
///
/// The file field is streamed straight into the staging file.
pub async fn upload_image_and_thumbs(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ThumbQuery>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<MasterAndSlave>, ApiError> {
    let Query(query) = query?;
    let mut multipart = multipart?;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let source = StreamReader::new(Box::pin(field.map_err(std::io::Error::other)));
        let result = state
            .service
            .upload_image_and_thumbs(&file_name, source, &query.cut_size)
            .await?;
        return Ok(Json(result));
    }
    Err(missing_file())
}
