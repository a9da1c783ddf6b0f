//! Zotero MCP Server
//!
//! Serves a local Zotero library over HTTP for MCP clients.

use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use zotero_mcp_server::config::Config;
use zotero_mcp_server::library::{LibrarySource, MemoryLibrary, ZoteroDatabase};
use zotero_mcp_server::pdf::{DocumentAccessService, LopdfExtractor};
use zotero_mcp_server::routes;
use zotero_mcp_server::server::Server;
use zotero_mcp_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "zotero_mcp_server=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let (config, errors) = Config::from_env();
    for e in &errors {
        tracing::warn!("{}, using its default", e);
    }

    if !config.enabled {
        tracing::info!("Zotero MCP server disabled (ZOTERO_MCP_ENABLED), exiting");
        return Ok(());
    }

    tracing::info!("Starting Zotero MCP Server v{}", env!("CARGO_PKG_VERSION"));

    let library: Arc<dyn LibrarySource> = match &config.library.snapshot {
        Some(path) => Arc::new(
            MemoryLibrary::load_json(path)
                .await
                .with_context(|| format!("Failed to load library snapshot {}", path.display()))?,
        ),
        None => {
            tracing::info!("Zotero data directory: {}", config.library.data_dir.display());
            Arc::new(
                ZoteroDatabase::open(config.library.data_dir.clone(), config.library.base_dir.clone())
                    .await
                    .context("Failed to open Zotero database")?,
            )
        }
    };
    tracing::info!("Serving library {}", library.library_id());

    let documents = DocumentAccessService::new(
        library.clone(),
        Arc::new(LopdfExtractor),
        config.extraction.timeout(),
    );
    let app_state = AppState::new(library, documents);
    let server = Server::new(routes::router(app_state));

    server.start(&config.server).await?;
    if !server.test_server().await {
        tracing::warn!("Self-test failed; the server may not be reachable");
    }

    shutdown_signal().await;
    server.stop().await;

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
