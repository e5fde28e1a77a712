//! # Stowage Cluster
//!
//! Access layer between the Stowage gateway and the distributed storage
//! cluster that actually holds the bytes.
//!
//! This crate provides:
//! - **Gateway client**: upload, slave upload, ranged download, delete and stat
//! - **Master/slave linkage**: slave ids derived from the master id and a prefix
//! - **Bounded transfers**: a fixed-size buffer between streams and byte buffers
//! - **Backends**: in-memory and filesystem clusters behind one connector trait
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │          StorageGatewayClient           │
//! │   (one connection per call, no reuse)   │
//! ├─────────────────────────────────────────┤
//! │    StorageCluster / ClusterConnection   │
//! ├────────────────────┬────────────────────┤
//! │   MemoryCluster    │ FilesystemCluster  │
//! └────────────────────┴────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use stowage_cluster::{MemoryCluster, Metadata, StorageGatewayClient};
//!
//! let client = StorageGatewayClient::new(Arc::new(MemoryCluster::new("group1")));
//! let id = client.upload(b"hello", "txt", &Metadata::with_file_name("hello.txt")).await?;
//! let mut out = Vec::new();
//! client.download(&id, &mut out).await?;
//! ```

pub mod backends;
pub mod config;
pub mod error;
pub mod gateway;
pub mod transfer;
pub mod types;

pub use backends::{FilesystemCluster, MemoryCluster};
pub use config::{ClusterBackend, ClusterConfig};
pub use error::{ErrorKind, Result, StorageError};
pub use gateway::StorageGatewayClient;
pub use transfer::{TransferBuffer, DEFAULT_BUFFER_SIZE};
pub use types::{
    file_extension, file_stem, ByteRange, FileId, FileInfo, MasterAndSlave, Metadata,
    FILE_NAME_KEY,
};

use async_trait::async_trait;
use tokio::io::AsyncRead;

/// Status codes a cluster reports for a finished operation
pub mod status {
    pub const OK: u8 = 0;
    pub const IO: u8 = 5;
    pub const NOT_FOUND: u8 = 2;
    pub const EXISTS: u8 = 17;
    pub const INVALID: u8 = 22;
}

/// Byte stream of a stored object (or a range of it)
pub type ObjectReader = Box<dyn AsyncRead + Send + Unpin>;

/// Entry point to a storage cluster: hands out fresh connections
#[async_trait]
pub trait StorageCluster: Send + Sync {
    /// Establish a new connection. Fails with `StorageUnavailable`.
    async fn connect(&self) -> Result<Box<dyn ClusterConnection>>;

    /// Whether objects survive a process restart
    fn is_persistent(&self) -> bool;
}

/// A single connection to the cluster, used for one gateway call
#[async_trait]
pub trait ClusterConnection: Send {
    /// Store a new object and return its id
    async fn upload(&mut self, data: &[u8], ext: &str, meta: &Metadata) -> Result<FileId>;

    /// Store `data` as a slave of `master` under `master + prefix`
    async fn upload_slave(
        &mut self,
        master: &FileId,
        prefix: &str,
        data: &[u8],
        ext: &str,
        meta: &Metadata,
    ) -> Result<FileId>;

    /// Open a reader over `range` of the object
    async fn open(&mut self, id: &FileId, range: ByteRange) -> Result<ObjectReader>;

    /// Delete an object, returning the cluster's status code
    async fn delete(&mut self, id: &FileId) -> Result<u8>;

    /// Look up an object's info; `None` if the cluster has no record
    async fn query_info(&mut self, id: &FileId) -> Result<Option<FileInfo>>;
}
