//! Lazily built, process-wide gateway transport

use crate::client::{CredentialInjector, FileClient};
use crate::config::ClientConfig;
use crate::routes::ApiRouteTable;
use crate::trust::{policy_for, TrustPolicy};
use crate::Result;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{error, info};

/// Builds the [`FileClient`] once and hands out the same instance afterwards.
///
/// The fast path only takes a read lock. A failed build is logged and leaves
/// nothing behind, so the next caller tries again. The client is built with
/// [`retry_policy`], so every call is sent exactly once.
pub struct TransportFactory {
    config: ClientConfig,
    trust: Arc<dyn TrustPolicy>,
    slot: RwLock<Option<Arc<FileClient>>>,
    init: Mutex<()>,
    builds: AtomicUsize,
}

impl TransportFactory {
    /// Factory using the trust policy named in `config`
    pub fn new(config: ClientConfig) -> Self {
        let trust = policy_for(&config);
        Self::with_trust_policy(config, trust)
    }

    /// Factory with an explicit trust policy
    pub fn with_trust_policy(config: ClientConfig, trust: Arc<dyn TrustPolicy>) -> Self {
        Self {
            config,
            trust,
            slot: RwLock::new(None),
            init: Mutex::new(()),
            builds: AtomicUsize::new(0),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The shared client, building it on first use
    pub fn file_client(&self) -> Result<Arc<FileClient>> {
        if let Some(client) = self.slot.read().as_ref() {
            return Ok(Arc::clone(client));
        }

        let _init = self.init.lock();
        if let Some(client) = self.slot.read().as_ref() {
            return Ok(Arc::clone(client));
        }

        match self.build() {
            Ok(client) => {
                let client = Arc::new(client);
                *self.slot.write() = Some(Arc::clone(&client));
                self.builds.fetch_add(1, Ordering::SeqCst);
                info!(base_url = %self.config.base_url, "Gateway transport initialised");
                Ok(client)
            }
            Err(e) => {
                error!(error = %e, base_url = %self.config.base_url, "Gateway transport initialisation failed");
                Err(e)
            }
        }
    }

    /// Number of clients successfully built by this factory
    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    fn build(&self) -> Result<FileClient> {
        let builder = reqwest::Client::builder()
            .connect_timeout(self.config.connect_timeout())
            .pool_max_idle_per_host(self.config.max_idle_connections)
            .pool_idle_timeout(self.config.keep_alive())
            .tcp_keepalive(self.config.keep_alive())
            .user_agent(self.config.user_agent.clone())
            .retry(retry_policy());
        let http = self.trust.configure(builder)?.build()?;
        let routes = ApiRouteTable::new(&self.config.base_url)?;
        Ok(FileClient::new(
            http,
            routes,
            CredentialInjector::new(self.config.token.clone()),
        ))
    }
}

/// Retry policy of every built client: never resend, not even after a
/// protocol-level refusal
pub fn retry_policy() -> reqwest::retry::Builder {
    reqwest::retry::never()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_policy_never_resends() {
        let policy = format!("{:?}", retry_policy());
        assert!(policy.contains("classifier: Never"), "{policy}");
        assert!(!policy.contains("ProtocolNacks"), "{policy}");
        assert!(!policy.contains("Unscoped"), "{policy}");
    }

    #[test]
    fn test_same_instance_returned() {
        let factory = TransportFactory::new(ClientConfig::new("http://127.0.0.1:9"));
        let a = factory.file_client().unwrap();
        let b = factory.file_client().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(factory.build_count(), 1);
    }

    #[test]
    fn test_bad_base_url_leaves_slot_empty() {
        let factory = TransportFactory::new(ClientConfig::new("::not a url::"));
        assert!(factory.file_client().is_err());
        assert!(factory.file_client().is_err());
        assert_eq!(factory.build_count(), 0);
    }
}
