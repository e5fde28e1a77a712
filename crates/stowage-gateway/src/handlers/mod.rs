//! File API request handlers

pub mod download;
pub mod file;
pub mod service;
pub mod upload;

pub use download::*;
pub use file::*;
pub use service::*;
pub use upload::*;

use serde::Deserialize;

/// `?fileId=` query
#[derive(Debug, Deserialize)]
pub struct FileIdQuery {
    #[serde(rename = "fileId", default)]
    pub file_id: String,
}
