//! Stowage Gateway - HTTP front end for the storage cluster

use clap::Parser;
use std::path::PathBuf;
use stowage_gateway::{run_server, GatewayConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "stowage-gateway")]
#[command(about = "HTTP gateway for the Stowage storage cluster")]
#[command(version)]
struct Args {
    /// Host to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0", env = "STOWAGE_HOST")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "8080", env = "STOWAGE_PORT")]
    port: u16,

    /// Properties file with the storage cluster connection parameters
    #[arg(long, env = "STOWAGE_CLUSTER_CONFIG")]
    cluster_config: Option<PathBuf>,

    /// Use an in-memory cluster (for testing, data will not persist)
    #[arg(long, env = "STOWAGE_MEMORY_CLUSTER")]
    memory_cluster: bool,

    /// Directory image uploads are staged in
    #[arg(long, env = "STOWAGE_STAGING_DIR")]
    staging_dir: Option<PathBuf>,

    /// Shared bearer token required on file routes
    #[arg(long, env = "STOWAGE_AUTH_TOKEN")]
    auth_token: Option<String>,

    /// Requests per second allowed per client address
    #[arg(long, default_value = "100", env = "STOWAGE_RATE_LIMIT")]
    rate_limit: u32,

    /// Enable debug logging
    #[arg(short, long, env = "STOWAGE_DEBUG")]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Setup logging
    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "stowage_gateway={0},stowage_cluster={0},tower_http=debug",
                    log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Stowage gateway on {}:{}", args.host, args.port);

    if args.memory_cluster {
        tracing::warn!("⚠️  Using in-memory cluster - data will NOT persist!");
    } else if let Some(ref path) = args.cluster_config {
        tracing::info!("Cluster configuration: {}", path.display());
    }

    if args.auth_token.is_none() {
        tracing::warn!("⚠️  No auth token configured - file routes are open");
    }

    let defaults = GatewayConfig::default();
    let config = GatewayConfig {
        host: args.host,
        port: args.port,
        cluster_config: args.cluster_config,
        use_memory_cluster: args.memory_cluster,
        staging_dir: args.staging_dir.unwrap_or(defaults.staging_dir.clone()),
        auth_token: args.auth_token,
        rate_limit_rps: args.rate_limit,
        ..defaults
    };

    run_server(config, shutdown_signal()).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
