//! Docforge HTTP API Server

use docforge_server::{AppState, config::ServerConfig, create_router, error::Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("docforge=info,docforge_server=debug,tower_http=debug")
        }))
        .init();

    // Load configuration
    let config = ServerConfig::from_env()?;
    let addr = config.socket_addr()?;
    info!(
        "Starting Docforge Server on {} with templates from {}",
        addr,
        config.templates_dir.display()
    );

    let state = AppState::from_config(config)?;
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
