//! File operations behind the HTTP handlers

use crate::derivative::{DerivativePipeline, DerivativeSpec, SourceImage};
use crate::error::ServiceError;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use stowage_cluster::{
    file_extension, file_stem, ByteRange, FileId, FileInfo, MasterAndSlave, Metadata,
    StorageError, StorageGatewayClient,
};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, instrument, warn};

/// A file received from a client
#[derive(Clone, Debug)]
pub struct FileUpload {
    /// Client-side file name, used for the extension and `fileName` metadata
    pub file_name: String,
    pub data: Bytes,
}

impl FileUpload {
    pub fn new(file_name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            data: data.into(),
        }
    }

    fn validate(&self) -> Result<(), ServiceError> {
        if self.data.is_empty() {
            return Err(ServiceError::validation("file is empty"));
        }
        Ok(())
    }
}

/// A resolved byte range of a stored object
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RangePlan {
    pub start: u64,
    pub length: u64,
    pub total: u64,
}

impl RangePlan {
    /// `Content-Range` header value
    pub fn content_range(&self) -> String {
        format!(
            "bytes {}-{}/{}",
            self.start,
            self.start + self.length - 1,
            self.total
        )
    }
}

/// Stateless per-request orchestration of uploads, downloads and queries.
///
/// Every failure leaves as a `ServiceError`; storage causes are logged here
/// and never reach the client.
#[derive(Clone)]
pub struct FileGatewayService {
    storage: StorageGatewayClient,
    pipeline: DerivativePipeline,
    staging_dir: PathBuf,
}

impl FileGatewayService {
    pub fn new(storage: StorageGatewayClient, staging_dir: impl Into<PathBuf>) -> Self {
        let pipeline = DerivativePipeline::new(storage.clone());
        Self::with_pipeline(storage, pipeline, staging_dir)
    }

    pub fn with_pipeline(
        storage: StorageGatewayClient,
        pipeline: DerivativePipeline,
        staging_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            storage,
            pipeline,
            staging_dir: staging_dir.into(),
        }
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    /// Store a plain file
    #[instrument(skip(self, upload), fields(file_name = %upload.file_name))]
    pub async fn upload(&self, upload: FileUpload) -> Result<FileId, ServiceError> {
        upload.validate()?;
        let ext = file_extension(&upload.file_name);
        self.storage
            .upload(&upload.data, ext, &Metadata::with_file_name(&upload.file_name))
            .await
            .map_err(|e| ServiceError::operation("upload failed", e))
    }

    /// Store a slave of `master` under a prefix derived from the file name
    #[instrument(skip(self, upload), fields(file_name = %upload.file_name))]
    pub async fn upload_slave(
        &self,
        master: &str,
        upload: FileUpload,
    ) -> Result<FileId, ServiceError> {
        let prefix = format!("{}_{}", file_stem(&upload.file_name), short_random());
        self.store_slave(master, &prefix, upload).await
    }

    /// Store a slave of `master` under `prefix` plus a random suffix
    #[instrument(skip(self, upload), fields(file_name = %upload.file_name))]
    pub async fn upload_slave_with_prefix(
        &self,
        master: &str,
        prefix: &str,
        upload: FileUpload,
    ) -> Result<FileId, ServiceError> {
        let prefix = prefix.trim();
        if prefix.is_empty() {
            return Err(ServiceError::validation("prefixName is empty"));
        }
        let prefix = format!("{}_{}", prefix, short_random());
        self.store_slave(master, &prefix, upload).await
    }

    async fn store_slave(
        &self,
        master: &str,
        prefix: &str,
        upload: FileUpload,
    ) -> Result<FileId, ServiceError> {
        let master = required_id(master, "masterFileId")?;
        upload.validate()?;
        let ext = file_extension(&upload.file_name);
        self.storage
            .upload_slave(
                &master,
                &upload.data,
                prefix,
                ext,
                &Metadata::with_file_name(&upload.file_name),
            )
            .await
            .map_err(|e| ServiceError::operation("upload slave failed", e))
    }

    /// Stage `source` to disk, upload it as the master and link one thumbnail
    /// per entry of `cut_size`.
    ///
    /// The staging file is removed before this returns, whatever the outcome.
    #[instrument(skip(self, source))]
    pub async fn upload_image_and_thumbs<R>(
        &self,
        file_name: &str,
        source: R,
        cut_size: &str,
    ) -> Result<MasterAndSlave, ServiceError>
    where
        R: AsyncRead + Unpin + Send,
    {
        if cut_size.trim().is_empty() {
            return Err(ServiceError::validation("cutSize is empty"));
        }
        let specs = DerivativeSpec::parse_list(cut_size)
            .map_err(|e| ServiceError::validation(e.to_string()))?;

        let staged = self.stage(source).await?;
        let result = self.thumbnail_staged(staged.path(), file_name, &specs).await;
        if let Err(e) = staged.close() {
            warn!(error = %e, "Failed to remove staging file");
        }
        result
    }

    async fn stage<R>(&self, source: R) -> Result<tempfile::NamedTempFile, ServiceError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let staging_error = |e: std::io::Error| {
            ServiceError::operation("upload image failed", StorageError::TransferFailed(e))
        };

        let staged = tempfile::Builder::new()
            .prefix("stowage-")
            .tempfile_in(&self.staging_dir)
            .map_err(staging_error)?;
        let mut file = tokio::fs::File::from_std(staged.reopen().map_err(staging_error)?);
        let size = self
            .storage
            .transfer()
            .copy(source, &mut file)
            .await
            .map_err(staging_error)?;
        debug!(path = %staged.path().display(), bytes = size, "Upload staged");

        if size == 0 {
            return Err(ServiceError::validation("file is empty"));
        }
        Ok(staged)
    }

    async fn thumbnail_staged(
        &self,
        path: &Path,
        file_name: &str,
        specs: &[DerivativeSpec],
    ) -> Result<MasterAndSlave, ServiceError> {
        self.pipeline
            .derive_and_upload(SourceImage::Staged(path.to_path_buf()), file_name, specs)
            .await
            .map_err(|e| ServiceError::operation("upload image failed", e))
    }

    /// Delete a file; deleting a missing file is an error
    #[instrument(skip(self))]
    pub async fn remove(&self, file_id: &str) -> Result<bool, ServiceError> {
        let id = required_id(file_id, "fileId")?;
        self.storage
            .delete(&id)
            .await
            .map_err(|e| ServiceError::operation("remove failed", e))
    }

    /// Stream a whole file into `sink`
    #[instrument(skip(self, sink))]
    pub async fn download<W>(&self, file_id: &str, sink: &mut W) -> Result<u64, ServiceError>
    where
        W: AsyncWrite + Unpin + Send + ?Sized,
    {
        let id = required_id(file_id, "fileId")?;
        self.storage
            .download(&id, sink)
            .await
            .map_err(|e| ServiceError::operation("download failed", e))
    }

    /// Stream `[start, start + length)` of a file into `sink`
    #[instrument(skip(self, sink))]
    pub async fn download_range<W>(
        &self,
        file_id: &str,
        start: i64,
        length: i64,
        sink: &mut W,
    ) -> Result<u64, ServiceError>
    where
        W: AsyncWrite + Unpin + Send + ?Sized,
    {
        let id = required_id(file_id, "fileId")?;
        self.storage
            .download_part(&id, start, length, sink)
            .await
            .map_err(|e| ServiceError::operation("download failed", e))
    }

    /// Validate a range request against the current object size
    pub async fn plan_range(
        &self,
        file_id: &str,
        start: i64,
        length: i64,
    ) -> Result<RangePlan, ServiceError> {
        let range = ByteRange::new(start, length)
            .map_err(|e| ServiceError::operation("download failed", e))?;
        let info = self.info(file_id).await?;
        let (start, length) = range
            .resolve(info.file_size)
            .map_err(|e| ServiceError::operation("download failed", e))?;
        Ok(RangePlan {
            start,
            length,
            total: info.file_size,
        })
    }

    /// Fetch the current info of a file
    #[instrument(skip(self))]
    pub async fn info(&self, file_id: &str) -> Result<FileInfo, ServiceError> {
        let id = required_id(file_id, "fileId")?;
        self.storage
            .stat(&id)
            .await
            .map_err(|e| ServiceError::operation("query file info failed", e))
    }
}

fn required_id(id: &str, name: &str) -> Result<FileId, ServiceError> {
    let id = FileId::new(id.trim());
    if id.is_empty() {
        return Err(ServiceError::validation(format!("{} is empty", name)));
    }
    Ok(id)
}

/// Short random token appended to slave prefixes
fn short_random() -> String {
    let mut token = uuid::Uuid::new_v4().simple().to_string();
    token.truncate(8);
    token
}
