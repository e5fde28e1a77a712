//! Gateway configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use stowage_cluster::DEFAULT_BUFFER_SIZE;

/// Gateway server configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Properties file with the storage cluster connection parameters
    pub cluster_config: Option<PathBuf>,
    /// Use an in-memory cluster (for testing/development)
    pub use_memory_cluster: bool,
    /// Directory image uploads are staged in before thumbnailing
    pub staging_dir: PathBuf,
    /// Size of the buffer used for every cluster transfer (bytes)
    pub transfer_buffer_size: usize,
    /// Shared bearer token required on file routes; `None` disables the check
    pub auth_token: Option<String>,
    /// Rate limit (requests per second per client address)
    pub rate_limit_rps: u32,
    /// Maximum request body size (bytes)
    pub max_body_size: usize,
    /// Enable CORS
    pub cors_enabled: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cluster_config: None,
            use_memory_cluster: false,
            staging_dir: std::env::temp_dir().join("stowage-staging"),
            transfer_buffer_size: DEFAULT_BUFFER_SIZE,
            auth_token: None,
            rate_limit_rps: 100,
            max_body_size: 512 * 1024 * 1024, // 512 MB
            cors_enabled: true,
        }
    }
}

impl GatewayConfig {
    /// Get the bind address
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Whether inbound requests must carry the shared token
    pub fn auth_enabled(&self) -> bool {
        self.auth_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}
