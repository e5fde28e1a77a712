//! # Stowage Client SDK
//!
//! Client for the Stowage HTTP gateway.
//!
//! ## Features
//!
//! - **Singleton transport**: one pooled HTTP client per factory, built on first use
//! - **Pluggable TLS trust**: accept-all or strict verification with extra roots
//! - **Bearer credentials**: attached to every request
//! - **Streaming downloads**: whole files or byte ranges into any `AsyncWrite`
//!
//! ## Example
//!
//! ```rust,ignore
//! use stowage_client::{ClientConfig, TransportFactory};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let factory = TransportFactory::new(
//!         ClientConfig::new("https://files.example.com").with_token("your-token"),
//!     );
//!     let client = factory.file_client()?;
//!
//!     let id = client.upload("hello.txt", b"Hello, World!".to_vec()).await?;
//!     let mut out = Vec::new();
//!     client.download(&id, &mut out).await?;
//!     Ok(())
//! }
//! ```

mod client;
mod config;
mod error;
mod routes;
mod transport;
mod trust;
mod types;

pub use client::{CredentialInjector, FileClient};
pub use config::{ClientConfig, TrustMode};
pub use error::{ClientError, Result};
pub use routes::{ApiRouteTable, FileApi};
pub use transport::{retry_policy, TransportFactory};
pub use trust::{policy_for, AcceptAllCertificates, StrictVerification, TrustPolicy};
pub use types::*;
