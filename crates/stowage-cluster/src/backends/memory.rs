//! In-memory cluster for testing and development

use super::allocate_file_id;
use crate::{
    status, ByteRange, ClusterConnection, FileId, FileInfo, Metadata, ObjectReader, Result,
    StorageCluster, StorageError,
};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Clone, Debug)]
struct StoredObject {
    data: Bytes,
    info: FileInfo,
    meta: Metadata,
    master: Option<FileId>,
}

impl StoredObject {
    fn new(data: &[u8], meta: &Metadata, master: Option<FileId>) -> Self {
        Self {
            data: Bytes::copy_from_slice(data),
            info: FileInfo {
                crc32: crc32fast::hash(data),
                create_timestamp: Utc::now(),
                file_size: data.len() as u64,
            },
            meta: meta.clone(),
            master,
        }
    }
}

/// An in-memory cluster. Clones share the same objects.
#[derive(Clone)]
pub struct MemoryCluster {
    group: String,
    objects: Arc<DashMap<FileId, StoredObject>>,
    online: Arc<AtomicBool>,
}

impl Default for MemoryCluster {
    fn default() -> Self {
        Self::new("group1")
    }
}

impl MemoryCluster {
    /// Create a new empty cluster serving `group`
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            objects: Arc::new(DashMap::new()),
            online: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Take the cluster offline (connections fail) or bring it back
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Get the number of objects stored
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Check if the cluster is empty
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn contains(&self, id: &FileId) -> bool {
        self.objects.contains_key(id)
    }

    /// Metadata stored with an object
    pub fn metadata(&self, id: &FileId) -> Option<Metadata> {
        self.objects.get(id).map(|entry| entry.meta.clone())
    }

    /// The master an object was linked to, if it is a slave
    pub fn master_of(&self, id: &FileId) -> Option<FileId> {
        self.objects.get(id).and_then(|entry| entry.master.clone())
    }
}

#[async_trait]
impl StorageCluster for MemoryCluster {
    async fn connect(&self) -> Result<Box<dyn ClusterConnection>> {
        if !self.online.load(Ordering::SeqCst) {
            return Err(StorageError::StorageUnavailable(
                "memory cluster is offline".to_string(),
            ));
        }
        Ok(Box::new(MemoryConnection {
            group: self.group.clone(),
            objects: Arc::clone(&self.objects),
        }))
    }

    fn is_persistent(&self) -> bool {
        false
    }
}

struct MemoryConnection {
    group: String,
    objects: Arc<DashMap<FileId, StoredObject>>,
}

#[async_trait]
impl ClusterConnection for MemoryConnection {
    async fn upload(&mut self, data: &[u8], ext: &str, meta: &Metadata) -> Result<FileId> {
        let id = allocate_file_id(&self.group, ext);
        self.objects
            .insert(id.clone(), StoredObject::new(data, meta, None));
        Ok(id)
    }

    async fn upload_slave(
        &mut self,
        master: &FileId,
        prefix: &str,
        data: &[u8],
        ext: &str,
        meta: &Metadata,
    ) -> Result<FileId> {
        let master_is_slave = match self.objects.get(master) {
            Some(entry) => entry.master.is_some(),
            None => return Err(StorageError::InvalidMaster(master.to_string())),
        };
        if master_is_slave {
            return Err(StorageError::InvalidMaster(master.to_string()));
        }

        let slave_id = master.slave_id(prefix, ext);
        match self.objects.entry(slave_id.clone()) {
            Entry::Occupied(_) => Err(StorageError::UploadRejected {
                code: status::EXISTS,
                reason: format!("slave {} already exists", slave_id),
            }),
            Entry::Vacant(slot) => {
                slot.insert(StoredObject::new(data, meta, Some(master.clone())));
                Ok(slave_id)
            }
        }
    }

    async fn open(&mut self, id: &FileId, range: ByteRange) -> Result<ObjectReader> {
        let data = self
            .objects
            .get(id)
            .map(|entry| entry.data.clone())
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;
        let (start, len) = range.resolve(data.len() as u64)?;
        let slice = data.slice(start as usize..(start + len) as usize);
        Ok(Box::new(Cursor::new(slice)))
    }

    async fn delete(&mut self, id: &FileId) -> Result<u8> {
        Ok(match self.objects.remove(id) {
            Some(_) => status::OK,
            None => status::NOT_FOUND,
        })
    }

    async fn query_info(&mut self, id: &FileId) -> Result<Option<FileInfo>> {
        Ok(self.objects.get(id).map(|entry| entry.info.clone()))
    }
}
