use anyhow::{Context, Result};
use certguard_common::clock::SystemClock;
use certguard_notify::EmailDispatcher;
use certguard_storage::Store;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use certguard_server::app;
use certguard_server::config::ServerConfig;
use certguard_server::state::AppState;

const DEFAULT_CONFIG_PATH: &str = "config/server.toml";

#[allow(clippy::print_stderr)]
fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  certguard-server [config.toml]    Start the server (default: {DEFAULT_CONFIG_PATH})");
    eprintln!("  certguard-server --help           Show this help");
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("certguard=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(String::as_str) {
        Some("--help" | "-h") => {
            print_usage();
            Ok(())
        }
        path => run_server(path.unwrap_or(DEFAULT_CONFIG_PATH)).await,
    }
}

async fn run_server(config_path: &str) -> Result<()> {
    let config = ServerConfig::load(config_path)?;

    tracing::info!(
        http_port = config.http_port,
        data_dir = %config.database.data_dir,
        db = %config.database.redacted_url(),
        "certguard-server starting"
    );

    let store = Store::new(
        &config.database.connection_url(),
        Path::new(&config.database.data_dir),
    )
    .await
    .context("Failed to open store")?;
    let dispatcher = Arc::new(
        EmailDispatcher::from_config(&config.email).context("Invalid [email] configuration")?,
    );

    let http_addr: SocketAddr = format!("{}:{}", config.bind_addr, config.http_port)
        .parse()
        .with_context(|| format!("Invalid bind address '{}'", config.bind_addr))?;

    let state = AppState::new(config, store, dispatcher, Arc::new(SystemClock))?;
    let app = app::build_http_app(state);

    let http_listener = tokio::net::TcpListener::bind(http_addr)
        .await
        .with_context(|| format!("Failed to bind {http_addr}"))?;
    tracing::info!(http = %http_addr, "Server started");

    axum::serve(http_listener, app)
        .with_graceful_shutdown(async {
            signal::ctrl_c().await.ok();
            tracing::info!("Shutting down gracefully");
        })
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}
