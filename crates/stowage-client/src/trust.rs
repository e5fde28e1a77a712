//! TLS trust policies for the transport

use crate::config::{ClientConfig, TrustMode};
use crate::{ClientError, Result};
use reqwest::{Certificate, ClientBuilder};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

/// Decides how the transport checks server certificates
pub trait TrustPolicy: Send + Sync {
    /// Apply this policy to a client under construction
    fn configure(&self, builder: ClientBuilder) -> Result<ClientBuilder>;
}

/// Accepts every certificate and host name.
///
/// Only for gateways on a trusted network or with self-signed certificates.
#[derive(Clone, Copy, Debug, Default)]
pub struct AcceptAllCertificates;

impl TrustPolicy for AcceptAllCertificates {
    fn configure(&self, builder: ClientBuilder) -> Result<ClientBuilder> {
        warn!("TLS certificate and host name verification disabled");
        Ok(builder
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true))
    }
}

/// Standard verification against the system roots and any extra PEM roots
#[derive(Clone, Debug, Default)]
pub struct StrictVerification {
    extra_roots: Vec<PathBuf>,
}

impl StrictVerification {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also trust the PEM certificates in these files
    pub fn with_extra_roots(extra_roots: Vec<PathBuf>) -> Self {
        Self { extra_roots }
    }
}

impl TrustPolicy for StrictVerification {
    fn configure(&self, mut builder: ClientBuilder) -> Result<ClientBuilder> {
        for path in &self.extra_roots {
            let pem = std::fs::read(path).map_err(|e| {
                ClientError::Config(format!("cannot read root certificate {}: {}", path.display(), e))
            })?;
            let cert = Certificate::from_pem(&pem).map_err(|e| {
                ClientError::Config(format!("invalid root certificate {}: {}", path.display(), e))
            })?;
            builder = builder.add_root_certificate(cert);
        }
        Ok(builder)
    }
}

/// The policy selected by `config.trust`
pub fn policy_for(config: &ClientConfig) -> Arc<dyn TrustPolicy> {
    match config.trust {
        TrustMode::AcceptAll => Arc::new(AcceptAllCertificates),
        TrustMode::Strict => Arc::new(StrictVerification::with_extra_roots(
            config.extra_root_certs.clone(),
        )),
    }
}
