//! Response types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored file info
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub crc32: u32,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub create_timestamp: DateTime<Utc>,
    pub file_size: u64,
}

/// A master file and the thumbnails linked to it
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterAndSlave {
    pub master: String,
    pub slaves: Vec<String>,
}
