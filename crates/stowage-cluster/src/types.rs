//! Data model shared by the cluster backends and the gateway

use crate::{Result, StorageError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Metadata key carrying the client-side file name of an upload
pub const FILE_NAME_KEY: &str = "fileName";

/// Opaque cluster-assigned handle of a stored object
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(String);

impl FileId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Derive the id a slave with `prefix` and `ext` gets next to this master.
    ///
    /// The slave keeps the master's location and stem; only the prefix and
    /// extension are appended, so the same inputs always give the same id.
    pub fn slave_id(&self, prefix: &str, ext: &str) -> FileId {
        let (dir, name) = match self.0.rsplit_once('/') {
            Some((dir, name)) => (Some(dir), name),
            None => (None, self.0.as_str()),
        };
        let stem = name.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(name);
        let mut slave = String::with_capacity(self.0.len() + prefix.len() + ext.len() + 1);
        if let Some(dir) = dir {
            slave.push_str(dir);
            slave.push('/');
        }
        slave.push_str(stem);
        slave.push_str(prefix);
        if !ext.is_empty() {
            slave.push('.');
            slave.push_str(ext);
        }
        FileId(slave)
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for FileId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for FileId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Name/value pairs stored alongside an object
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(BTreeMap<String, String>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Metadata holding only the original file name
    pub fn with_file_name(name: impl Into<String>) -> Self {
        let mut meta = Self::new();
        meta.insert(FILE_NAME_KEY, name);
        meta
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn file_name(&self) -> Option<&str> {
        self.get(FILE_NAME_KEY)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }
}

/// Snapshot returned by a stat query. Never cached.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub crc32: u32,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub create_timestamp: DateTime<Utc>,
    pub file_size: u64,
}

/// A master object and the slaves successfully linked to it, in request order
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterAndSlave {
    master: FileId,
    slaves: Vec<FileId>,
}

impl MasterAndSlave {
    /// Start a result with its master; slaves can only be appended afterwards
    pub fn new(master: FileId) -> Self {
        Self::with_capacity(master, 0)
    }

    pub fn with_capacity(master: FileId, slaves: usize) -> Self {
        Self {
            master,
            slaves: Vec::with_capacity(slaves),
        }
    }

    pub fn push_slave(&mut self, slave: FileId) {
        self.slaves.push(slave);
    }

    pub fn master(&self) -> &FileId {
        &self.master
    }

    pub fn slaves(&self) -> &[FileId] {
        &self.slaves
    }
}

/// A validated byte range request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ByteRange {
    offset: u64,
    length: Option<u64>,
}

impl ByteRange {
    /// The whole object
    pub const FULL: ByteRange = ByteRange {
        offset: 0,
        length: None,
    };

    /// Validate a caller supplied `[offset, offset + length)` range
    pub fn new(offset: i64, length: i64) -> Result<Self> {
        if offset < 0 || length <= 0 {
            return Err(StorageError::InvalidRange { offset, length });
        }
        Ok(Self {
            offset: offset as u64,
            length: Some(length as u64),
        })
    }

    /// Clamp against an object of `size` bytes, returning `(start, len)`.
    ///
    /// Ranges running past the end are truncated; a partial range starting at
    /// or after the end is rejected.
    pub fn resolve(&self, size: u64) -> Result<(u64, u64)> {
        match self.length {
            None => Ok((0, size)),
            Some(length) if self.offset >= size => Err(StorageError::InvalidRange {
                offset: self.offset as i64,
                length: length as i64,
            }),
            Some(length) => Ok((self.offset, length.min(size - self.offset))),
        }
    }
}

/// Extension of a client file name, without the dot (`""` if none)
pub fn file_extension(file_name: &str) -> &str {
    let base = base_name(file_name);
    match base.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext,
        _ => "",
    }
}

/// File name without directories and extension
pub fn file_stem(file_name: &str) -> &str {
    let base = base_name(file_name);
    match base.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => base,
    }
}

fn base_name(file_name: &str) -> &str {
    file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name)
}
