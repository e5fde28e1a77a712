//! Gateway-facing client of the storage cluster

use crate::{
    status, ByteRange, ClusterConnection, FileId, FileInfo, Metadata, Result, StorageCluster,
    StorageError, TransferBuffer,
};
use std::sync::Arc;
use tokio::io::AsyncWrite;
use tracing::{debug, instrument, warn};

/// Upload/download/delete/stat primitives over a storage cluster.
///
/// Every call opens its own cluster connection and drops it before
/// returning; nothing is held between calls.
#[derive(Clone)]
pub struct StorageGatewayClient {
    cluster: Arc<dyn StorageCluster>,
    transfer: TransferBuffer,
}

impl StorageGatewayClient {
    pub fn new(cluster: Arc<dyn StorageCluster>) -> Self {
        Self::with_transfer(cluster, TransferBuffer::default())
    }

    pub fn with_transfer(cluster: Arc<dyn StorageCluster>, transfer: TransferBuffer) -> Self {
        Self { cluster, transfer }
    }

    pub fn cluster(&self) -> &Arc<dyn StorageCluster> {
        &self.cluster
    }

    pub fn transfer(&self) -> TransferBuffer {
        self.transfer
    }

    async fn connection(&self) -> Result<Box<dyn ClusterConnection>> {
        self.cluster.connect().await
    }

    /// Store `data` as a new object
    #[instrument(skip(self, data, meta), fields(size = data.len()))]
    pub async fn upload(&self, data: &[u8], ext: &str, meta: &Metadata) -> Result<FileId> {
        let mut conn = self.connection().await?;
        let id = conn.upload(data, ext, meta).await?;
        debug!(file_id = %id, "Uploaded object");
        Ok(id)
    }

    /// Store `data` as a slave of `master`; the slave id is `master + prefix`
    #[instrument(skip(self, data, meta), fields(size = data.len()))]
    pub async fn upload_slave(
        &self,
        master: &FileId,
        data: &[u8],
        prefix: &str,
        ext: &str,
        meta: &Metadata,
    ) -> Result<FileId> {
        if master.is_empty() {
            return Err(StorageError::InvalidMaster(master.to_string()));
        }
        let mut conn = self.connection().await?;
        let id = conn.upload_slave(master, prefix, data, ext, meta).await?;
        debug!(file_id = %id, "Uploaded slave object");
        Ok(id)
    }

    /// Stream the whole object into `sink`, returning the byte count
    pub async fn download<W>(&self, id: &FileId, sink: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin + Send + ?Sized,
    {
        self.download_range(id, ByteRange::FULL, sink).await
    }

    /// Stream `[offset, offset + length)` of the object into `sink`
    pub async fn download_part<W>(
        &self,
        id: &FileId,
        offset: i64,
        length: i64,
        sink: &mut W,
    ) -> Result<u64>
    where
        W: AsyncWrite + Unpin + Send + ?Sized,
    {
        let range = ByteRange::new(offset, length)?;
        self.download_range(id, range, sink).await
    }

    /// Stream a validated range into `sink`.
    ///
    /// On `TransferFailed` the sink may hold a prefix of the data and must
    /// be discarded by the caller.
    #[instrument(skip(self, sink))]
    pub async fn download_range<W>(&self, id: &FileId, range: ByteRange, sink: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin + Send + ?Sized,
    {
        let mut conn = self.connection().await?;
        let reader = conn.open(id, range).await?;
        let copied = self
            .transfer
            .copy(reader, sink)
            .await
            .map_err(StorageError::TransferFailed)?;
        debug!(file_id = %id, bytes = copied, "Downloaded object");
        Ok(copied)
    }

    /// Delete an object. `true` only when the cluster reports success.
    ///
    /// Deleting an object that does not exist is an error, not a no-op.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: &FileId) -> Result<bool> {
        let mut conn = self.connection().await?;
        match conn.delete(id).await? {
            status::OK => Ok(true),
            status::NOT_FOUND => Err(StorageError::NotFound(id.to_string())),
            code => {
                warn!(file_id = %id, code, "Cluster refused delete");
                Ok(false)
            }
        }
    }

    /// Fetch a fresh info snapshot
    #[instrument(skip(self))]
    pub async fn stat(&self, id: &FileId) -> Result<FileInfo> {
        let mut conn = self.connection().await?;
        conn.query_info(id)
            .await?
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }
}
