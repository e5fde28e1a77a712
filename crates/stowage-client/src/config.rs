//! Client transport configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// How server certificates are checked
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustMode {
    /// Accept any certificate and host name
    #[default]
    AcceptAll,
    /// Verify against system roots plus any configured extra roots
    Strict,
}

/// Transport configuration, read once when the transport is built.
///
/// Changing a config after handing it to a [`crate::TransportFactory`] has no
/// effect on that factory.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Gateway base URL, e.g. `https://files.example.com`
    pub base_url: String,
    /// Bearer token sent with every request
    pub token: Option<String>,
    /// TCP connect timeout (seconds)
    pub connect_timeout_secs: u64,
    /// Idle connections kept per host
    pub max_idle_connections: usize,
    /// How long an idle connection is kept alive (seconds)
    pub keep_alive_secs: u64,
    /// Certificate trust policy
    pub trust: TrustMode,
    /// Extra PEM root certificates for [`TrustMode::Strict`]
    pub extra_root_certs: Vec<PathBuf>,
    /// User agent string
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            token: None,
            connect_timeout_secs: 10,
            max_idle_connections: 5,
            keep_alive_secs: 300,
            trust: TrustMode::default(),
            extra_root_certs: Vec::new(),
            user_agent: format!("stowage-client/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    /// Create a new config with the given base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Set the bearer token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_secs = timeout.as_secs();
        self
    }

    /// Set pool size and idle keep-alive
    pub fn with_pool(mut self, max_idle_connections: usize, keep_alive: Duration) -> Self {
        self.max_idle_connections = max_idle_connections;
        self.keep_alive_secs = keep_alive.as_secs();
        self
    }

    /// Verify certificates, optionally trusting extra PEM roots
    pub fn with_strict_trust(mut self, extra_root_certs: Vec<PathBuf>) -> Self {
        self.trust = TrustMode::Strict;
        self.extra_root_certs = extra_root_certs;
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = ClientConfig::new("https://files.example.com")
            .with_token("tok")
            .with_connect_timeout(Duration::from_secs(3))
            .with_pool(2, Duration::from_secs(60));

        assert_eq!(config.token.as_deref(), Some("tok"));
        assert_eq!(config.connect_timeout(), Duration::from_secs(3));
        assert_eq!(config.max_idle_connections, 2);
        assert_eq!(config.keep_alive(), Duration::from_secs(60));
        assert_eq!(config.trust, TrustMode::AcceptAll);
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: ClientConfig = serde_json::from_str(
            r#"{"base_url": "https://gw:8443", "trust": "strict"}"#,
        )
        .unwrap();
        assert_eq!(config.base_url, "https://gw:8443");
        assert_eq!(config.trust, TrustMode::Strict);
        assert_eq!(config.keep_alive_secs, 300);
    }
}
