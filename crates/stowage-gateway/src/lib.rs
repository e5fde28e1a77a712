//! # Stowage Gateway
//!
//! HTTP gateway in front of a Stowage storage cluster.
//!
//! This crate provides:
//! - **File API**: upload, slave upload, remove, info, streaming and range downloads
//! - **Thumbnails**: image uploads linked to resized slave copies
//! - **Authentication**: optional shared bearer token
//! - **Rate Limiting**: per-client request throttling
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                   HTTP Clients                      │
//! │            (stowage-client, curl, etc.)             │
//! └─────────────────────────┬───────────────────────────┘
//!                           │
//! ┌─────────────────────────▼───────────────────────────┐
//! │                  Stowage Gateway                    │
//! ├─────────────────────────────────────────────────────┤
//! │  Auth Middleware │ Rate Limiter │ Request Id        │
//! ├─────────────────────────────────────────────────────┤
//! │     File handlers  →  FileGatewayService            │
//! │                        └─ DerivativePipeline        │
//! ├─────────────────────────────────────────────────────┤
//! │                  stowage-cluster                    │
//! │      (StorageGatewayClient, TransferBuffer)         │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod auth;
pub mod config;
pub mod derivative;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod service;
pub mod state;

pub use config::GatewayConfig;
pub use derivative::{DerivativePipeline, DerivativeSpec, ImageRenderer, ThumbnailRenderer};
pub use error::{ApiError, GatewayErrorCode, ServiceError};
pub use server::{run_server, serve};
pub use service::{FileGatewayService, FileUpload};
pub use state::AppState;
