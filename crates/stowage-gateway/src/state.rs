//! Application state

use crate::config::GatewayConfig;
use crate::service::FileGatewayService;
use std::sync::Arc;
use stowage_cluster::{ClusterConfig, StorageCluster, StorageGatewayClient, TransferBuffer};
use tracing::{info, warn};

/// Application state shared across handlers
pub struct AppState {
    /// Gateway configuration
    pub config: GatewayConfig,
    /// File operations
    pub service: FileGatewayService,
}

impl AppState {
    /// Connect to the configured cluster and prepare the staging directory
    pub async fn new(config: GatewayConfig) -> anyhow::Result<Self> {
        let cluster_config = if config.use_memory_cluster {
            ClusterConfig::memory()
        } else if let Some(path) = &config.cluster_config {
            ClusterConfig::load(path)?
        } else {
            warn!("No cluster configuration given, using defaults");
            ClusterConfig::default()
        };
        let cluster = cluster_config.connect().await?;

        if cluster.is_persistent() {
            info!(group = %cluster_config.group, "✓ Storage mode: filesystem cluster (persistent)");
        } else {
            warn!("⚠ Storage mode: in-memory cluster (NOT persistent - for development only)");
        }

        tokio::fs::create_dir_all(&config.staging_dir).await?;
        Ok(Self::with_cluster(config, cluster))
    }

    /// Build state over an existing cluster
    pub fn with_cluster(config: GatewayConfig, cluster: Arc<dyn StorageCluster>) -> Self {
        let storage = StorageGatewayClient::with_transfer(
            cluster,
            TransferBuffer::new(config.transfer_buffer_size),
        );
        let service = FileGatewayService::new(storage, config.staging_dir.clone());
        Self { config, service }
    }
}
