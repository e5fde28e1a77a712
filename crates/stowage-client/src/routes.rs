//! Gateway operation to endpoint URL mapping

use crate::Result;
use std::collections::HashMap;
use url::Url;

/// Operations offered by the gateway
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FileApi {
    Upload,
    UploadSlave,
    UploadSlavePrefix,
    UploadImageThumb,
    Remove,
    Download,
    DownloadRange,
    Info,
}

impl FileApi {
    pub const ALL: [FileApi; 8] = [
        FileApi::Upload,
        FileApi::UploadSlave,
        FileApi::UploadSlavePrefix,
        FileApi::UploadImageThumb,
        FileApi::Remove,
        FileApi::Download,
        FileApi::DownloadRange,
        FileApi::Info,
    ];

    /// Path of the operation below the gateway base URL
    pub fn path(&self) -> &'static str {
        match self {
            Self::Upload => "/file/upload",
            Self::UploadSlave => "/file/upload-slave",
            Self::UploadSlavePrefix => "/file/upload-slave-prefix",
            Self::UploadImageThumb => "/file/upload-image-thumb",
            Self::Remove => "/file/remove",
            Self::Download => "/file/download",
            Self::DownloadRange => "/file/download-range",
            Self::Info => "/file/info",
        }
    }
}

/// Absolute endpoint URL of every operation, fixed at construction
#[derive(Clone, Debug)]
pub struct ApiRouteTable {
    routes: HashMap<FileApi, Url>,
}

impl ApiRouteTable {
    pub fn new(base_url: &str) -> Result<Self> {
        let base = base_url.trim().trim_end_matches('/');
        let mut routes = HashMap::with_capacity(FileApi::ALL.len());
        for api in FileApi::ALL {
            routes.insert(api, Url::parse(&format!("{}{}", base, api.path()))?);
        }
        Ok(Self { routes })
    }

    pub fn url(&self, api: FileApi) -> &Url {
        // every variant is inserted in `new`
        &self.routes[&api]
    }
}
