//! Storage cluster connection parameters
//!
//! Loaded once at process start from a properties-style file:
//!
//! ```text
//! backend = filesystem
//! data_dir = /var/lib/stowage
//! group = group1
//! ```
//!
//! Every key can be overridden with a `STOWAGE_CLUSTER_<KEY>` environment
//! variable.

use crate::{FilesystemCluster, MemoryCluster, Result, StorageCluster, StorageError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Which cluster implementation to connect to
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterBackend {
    /// Objects kept in process memory; lost on restart
    Memory,
    /// Objects stored as files below `data_dir`
    #[default]
    Filesystem,
}

/// Cluster configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Backend selection
    pub backend: ClusterBackend,
    /// Storage group new objects are placed in
    pub group: String,
    /// Root directory for the filesystem backend
    pub data_dir: PathBuf,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            backend: ClusterBackend::default(),
            group: "group1".to_string(),
            data_dir: PathBuf::from("./data"),
        }
    }
}

impl ClusterConfig {
    /// In-memory cluster configuration (tests, development)
    pub fn memory() -> Self {
        Self {
            backend: ClusterBackend::Memory,
            ..Default::default()
        }
    }

    /// Load from a properties file, then apply environment overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let settings = config::Config::builder()
            .add_source(config::File::new(
                &path.to_string_lossy(),
                config::FileFormat::Ini,
            ))
            .add_source(config::Environment::with_prefix("STOWAGE_CLUSTER"))
            .build()?;
        let cluster: ClusterConfig = settings.try_deserialize()?;
        cluster.validate()?;
        info!(
            path = %path.display(),
            backend = ?cluster.backend,
            group = %cluster.group,
            "Loaded cluster configuration"
        );
        Ok(cluster)
    }

    fn validate(&self) -> Result<()> {
        if self.group.is_empty() || self.group.contains(['/', '\\']) {
            return Err(StorageError::Configuration(format!(
                "invalid storage group {:?}",
                self.group
            )));
        }
        Ok(())
    }

    /// Build the configured cluster
    pub async fn connect(&self) -> Result<Arc<dyn StorageCluster>> {
        self.validate()?;
        Ok(match self.backend {
            ClusterBackend::Memory => Arc::new(MemoryCluster::new(&self.group)),
            ClusterBackend::Filesystem => {
                Arc::new(FilesystemCluster::new(&self.data_dir, &self.group).await?)
            }
        })
    }
}
