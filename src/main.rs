use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use keyspace_api::config::{AppConfig, StoreBackend};
use keyspace_api::store::{DocumentStore, MemoryStore, PostgresStore};
use keyspace_api::{app, AppState};

#[derive(Parser)]
#[command(name = "keyspace-api", version, about = "Key-scoped JSON document backend")]
struct Args {
    /// Port to listen on (overrides PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Document store backend (overrides STORE_BACKEND)
    #[arg(long)]
    store: Option<StoreBackend>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so DB_* and PORT are picked up in development
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info")),
        )
        .init();

    let args = Args::parse();
    let mut config = AppConfig::from_env();
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(backend) = args.store {
        config.database.backend = backend;
    }
    tracing::info!("Starting keyspace-api in {:?} mode", config.environment);

    // Postgres handle kept aside so the pool can be drained on shutdown
    let mut postgres = None;
    let store: Arc<dyn DocumentStore> = match config.database.backend {
        StoreBackend::Postgres => {
            tracing::info!("Connecting to the document store...");
            let store = PostgresStore::connect(&config.database)
                .await
                .context("failed to connect to the document store")?;
            tracing::info!("Document store connected");
            postgres = Some(store.clone());
            Arc::new(store)
        }
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory store; data is lost on restart");
            MemoryStore::new_shared()
        }
    };

    let bind_addr = config.bind_addr();
    let router = app(AppState::new(store, config));

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("keyspace-api listening on http://{}", bind_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    if let Some(store) = postgres {
        store.close().await;
    }
    tracing::info!("keyspace-api stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, draining connections");
}
