//! Filesystem-backed cluster.
//!
//! Objects live under `<root>/<group>/M00/<xx>/<yy>/`, each next to a JSON
//! sidecar (`<name>.meta.json`) holding its info, metadata and master link.

use super::allocate_file_id;
use crate::{
    status, ByteRange, ClusterConnection, FileId, FileInfo, Metadata, ObjectReader, Result,
    StorageCluster, StorageError,
};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::io::{ErrorKind, SeekFrom};
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::{instrument, warn};

const SIDECAR_SUFFIX: &str = ".meta.json";

#[derive(Debug, Serialize, Deserialize)]
struct Sidecar {
    info: FileInfo,
    #[serde(default)]
    meta: Metadata,
    #[serde(default)]
    master: Option<FileId>,
}

/// Cluster storing objects as plain files under a root directory
#[derive(Clone, Debug)]
pub struct FilesystemCluster {
    root: PathBuf,
    group: String,
}

impl FilesystemCluster {
    /// Create the cluster, creating `root` if needed
    pub async fn new(root: impl AsRef<Path>, group: impl Into<String>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await.map_err(|e| {
            StorageError::StorageUnavailable(format!(
                "cannot create data dir {}: {}",
                root.display(),
                e
            ))
        })?;
        Ok(Self {
            root,
            group: group.into(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl StorageCluster for FilesystemCluster {
    async fn connect(&self) -> Result<Box<dyn ClusterConnection>> {
        match fs::metadata(&self.root).await {
            Ok(meta) if meta.is_dir() => Ok(Box::new(FilesystemConnection {
                root: self.root.clone(),
                group: self.group.clone(),
            })),
            Ok(_) => Err(StorageError::StorageUnavailable(format!(
                "{} is not a directory",
                self.root.display()
            ))),
            Err(e) => Err(StorageError::StorageUnavailable(format!(
                "{}: {}",
                self.root.display(),
                e
            ))),
        }
    }

    fn is_persistent(&self) -> bool {
        true
    }
}

struct FilesystemConnection {
    root: PathBuf,
    group: String,
}

impl FilesystemConnection {
    /// Map an id onto the data file; ids outside our group never resolve
    fn object_path(&self, id: &FileId) -> Option<PathBuf> {
        let rel = Path::new(id.as_str());
        let mut components = rel.components();
        match components.next() {
            Some(Component::Normal(first)) if first == self.group.as_str() => {}
            _ => return None,
        }
        if !components.all(|c| matches!(c, Component::Normal(_)))
            || id.as_str().ends_with(SIDECAR_SUFFIX)
        {
            return None;
        }
        Some(self.root.join(rel))
    }

    fn sidecar_path(path: &Path) -> PathBuf {
        let mut sidecar = path.as_os_str().to_owned();
        sidecar.push(SIDECAR_SUFFIX);
        PathBuf::from(sidecar)
    }

    async fn read_sidecar(&self, path: &Path) -> Result<Option<Sidecar>> {
        match fs::read(Self::sidecar_path(path)).await {
            Ok(raw) => serde_json::from_slice(&raw).map(Some).map_err(|e| {
                StorageError::TransferFailed(std::io::Error::new(ErrorKind::InvalidData, e))
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::TransferFailed(e)),
        }
    }

    async fn store(
        &self,
        id: &FileId,
        data: &[u8],
        meta: &Metadata,
        master: Option<FileId>,
    ) -> Result<()> {
        let path = self
            .object_path(id)
            .ok_or_else(|| StorageError::InvalidMaster(id.to_string()))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(rejected)?;
        }

        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StorageError::UploadRejected {
                    code: status::EXISTS,
                    reason: format!("{} already exists", id),
                })
            }
            Err(e) => return Err(rejected(e)),
        };
        file.write_all(data).await.map_err(rejected)?;
        file.sync_all().await.map_err(rejected)?;

        let sidecar = Sidecar {
            info: FileInfo {
                crc32: crc32fast::hash(data),
                create_timestamp: Utc::now(),
                file_size: data.len() as u64,
            },
            meta: meta.clone(),
            master,
        };
        let raw = serde_json::to_vec(&sidecar)
            .map_err(|e| rejected(std::io::Error::new(ErrorKind::InvalidData, e)))?;
        fs::write(Self::sidecar_path(&path), raw)
            .await
            .map_err(rejected)?;
        Ok(())
    }
}

fn rejected(err: std::io::Error) -> StorageError {
    StorageError::UploadRejected {
        code: status::IO,
        reason: err.to_string(),
    }
}

#[async_trait]
impl ClusterConnection for FilesystemConnection {
    #[instrument(skip(self, data, meta), fields(size = data.len()))]
    async fn upload(&mut self, data: &[u8], ext: &str, meta: &Metadata) -> Result<FileId> {
        let id = allocate_file_id(&self.group, ext);
        self.store(&id, data, meta, None).await?;
        Ok(id)
    }

    #[instrument(skip(self, data, meta), fields(size = data.len()))]
    async fn upload_slave(
        &mut self,
        master: &FileId,
        prefix: &str,
        data: &[u8],
        ext: &str,
        meta: &Metadata,
    ) -> Result<FileId> {
        let master_path = self
            .object_path(master)
            .ok_or_else(|| StorageError::InvalidMaster(master.to_string()))?;
        match self.read_sidecar(&master_path).await? {
            Some(sidecar) if sidecar.master.is_none() => {}
            _ => return Err(StorageError::InvalidMaster(master.to_string())),
        }

        let slave_id = master.slave_id(prefix, ext);
        self.store(&slave_id, data, meta, Some(master.clone()))
            .await?;
        Ok(slave_id)
    }

    async fn open(&mut self, id: &FileId, range: ByteRange) -> Result<ObjectReader> {
        let path = self
            .object_path(id)
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;
        let mut file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(id.to_string()))
            }
            Err(e) => return Err(StorageError::TransferFailed(e)),
        };
        let size = file
            .metadata()
            .await
            .map_err(StorageError::TransferFailed)?
            .len();
        let (start, len) = range.resolve(size)?;
        if start > 0 {
            file.seek(SeekFrom::Start(start))
                .await
                .map_err(StorageError::TransferFailed)?;
        }
        Ok(Box::new(file.take(len)))
    }

    async fn delete(&mut self, id: &FileId) -> Result<u8> {
        let Some(path) = self.object_path(id) else {
            return Ok(status::NOT_FOUND);
        };
        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(status::NOT_FOUND),
            Err(e) => {
                warn!(file_id = %id, error = %e, "Failed to remove object file");
                return Ok(status::IO);
            }
        }
        if let Err(e) = fs::remove_file(Self::sidecar_path(&path)).await {
            if e.kind() != ErrorKind::NotFound {
                warn!(file_id = %id, error = %e, "Failed to remove object sidecar");
            }
        }
        Ok(status::OK)
    }

    async fn query_info(&mut self, id: &FileId) -> Result<Option<FileInfo>> {
        let Some(path) = self.object_path(id) else {
            return Ok(None);
        };
        Ok(self.read_sidecar(&path).await?.map(|sidecar| sidecar.info))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn read_all(mut reader: ObjectReader) -> Vec<u8> {
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        out
    }

    #[tokio::test]
    async fn test_filesystem_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let cluster = FilesystemCluster::new(dir.path(), "group1").await.unwrap();
        let mut conn = cluster.connect().await.unwrap();

        let id = conn
            .upload(b"persistent bytes", "bin", &Metadata::with_file_name("a.bin"))
            .await
            .unwrap();
        assert!(dir.path().join(id.as_str()).is_file());

        let data = read_all(conn.open(&id, ByteRange::FULL).await.unwrap()).await;
        assert_eq!(data, b"persistent bytes");

        let range = ByteRange::new(11, 100).unwrap();
        assert_eq!(read_all(conn.open(&id, range).await.unwrap()).await, b"bytes");

        let info = conn.query_info(&id).await.unwrap().unwrap();
        assert_eq!(info.file_size, 16);
        assert_eq!(info.crc32, crc32fast::hash(b"persistent bytes"));
    }

    #[tokio::test]
    async fn test_filesystem_slaves_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let cluster = FilesystemCluster::new(dir.path(), "group1").await.unwrap();
        let mut conn = cluster.connect().await.unwrap();
        let meta = Metadata::new();

        let master = conn.upload(b"master", "jpg", &meta).await.unwrap();
        let slave = conn
            .upload_slave(&master, "200x200", b"small", "jpg", &meta)
            .await
            .unwrap();
        assert_eq!(slave, master.slave_id("200x200", "jpg"));
        assert!(matches!(
            conn.upload_slave(&master, "200x200", b"small", "jpg", &meta).await,
            Err(StorageError::UploadRejected { code: status::EXISTS, .. })
        ));

        assert_eq!(conn.delete(&slave).await.unwrap(), status::OK);
        assert_eq!(conn.delete(&slave).await.unwrap(), status::NOT_FOUND);
        assert!(conn.query_info(&slave).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_foreign_ids_do_not_resolve() {
        let dir = tempfile::tempdir().unwrap();
        let cluster = FilesystemCluster::new(dir.path(), "group1").await.unwrap();
        let mut conn = cluster.connect().await.unwrap();

        for id in ["group2/M00/00/00/a.jpg", "group1/../../etc/passwd", "/group1/a"] {
            let id = FileId::new(id);
            assert!(matches!(
                conn.open(&id, ByteRange::FULL).await,
                Err(StorageError::NotFound(_))
            ));
        }
        assert!(matches!(
            conn.upload_slave(&FileId::new("group1/M00/00/00/nope.jpg"), "x", b"", "jpg", &Metadata::new())
                .await,
            Err(StorageError::InvalidMaster(_))
        ));
    }
}
