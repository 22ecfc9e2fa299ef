//! API Server binary entrypoint.

use api_server::{ApiServer, ServerConfig};
use clap::Parser;
use ecoguard_core::Config;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// EcoGuard Pro API server.
#[derive(Debug, Parser)]
#[command(name = "api-server", version, about)]
struct Args {
    /// Host to bind to (overrides API_HOST).
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides PORT / API_PORT).
    #[arg(long, short)]
    port: Option<u16>,

    /// Directory for persisted session and profile (overrides ECOGUARD_STORAGE_DIR).
    #[arg(long)]
    storage_dir: Option<PathBuf>,

    /// Emit logs as JSON.
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "api_server=debug,security=debug,auth=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);
    if args.json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    let mut app_config = Config::from_env()?;
    if let Some(dir) = args.storage_dir {
        app_config.storage.dir = Some(dir);
    }

    let mut config = ServerConfig::from_env();
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    tracing::info!(
        environment = %app_config.environment,
        persistent_key = app_config.security.session_key.is_some(),
        "Configuration loaded"
    );

    let server = ApiServer::new(config, &app_config)?;
    server.run().await?;

    Ok(())
}
