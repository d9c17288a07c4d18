//! linkdigest server entry point.
//!
//! Boots the MCP server on stdio transport. Logging goes to stderr to avoid
//! interfering with the JSON-RPC protocol on stdout.

use anyhow::Result;
use linkdigest_core::AppConfig;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

mod handler;
mod state;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    let state = state::AppState::build(config).await?;

    tracing::info!(
        cache = state.cache().is_some(),
        max_concurrency = state.config.network.max_concurrency,
        "Starting linkdigest server on stdio transport"
    );

    let handler = handler::LinkDigestServer::new(state);
    let server = serve_server(handler, stdio()).await?;

    server.waiting().await?;

    Ok(())
}
