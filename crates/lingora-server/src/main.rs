// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Lingora Server - HTTP API entrypoint
//!
//! Wires the storage layer, the filesystem artifact store, and the workflow
//! engine into one HTTP server.

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use lingora_core::{
    ArtifactStore, FsArtifactStore, Persistence, PostgresPersistence, SqlitePersistence,
};
use lingora_server::{AppState, Config, router};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (from crate directory or parent directories)
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("lingora_server=info".parse().unwrap())
                .add_directive("lingora_engine=info".parse().unwrap()),
        )
        .init();

    info!("Starting Lingora Server");

    let config = Config::from_env().inspect_err(|e| {
        tracing::error!("Configuration error: {}", e);
    })?;

    info!(
        http_addr = %config.http_addr,
        artifact_dir = %config.artifact_dir.display(),
        "Configuration loaded"
    );

    // The backend is selected by URL scheme; both run the same migrations.
    let persistence: Arc<dyn Persistence> =
        if let Some(path) = config.database_url.strip_prefix("sqlite:") {
            info!("Using SQLite persistence");
            Arc::new(SqlitePersistence::from_path(path).await?)
        } else {
            info!("Using PostgreSQL persistence");
            Arc::new(PostgresPersistence::connect(&config.database_url).await?)
        };

    let artifacts: Arc<dyn ArtifactStore> = Arc::new(FsArtifactStore::new(&config.artifact_dir));

    let state = AppState::new(persistence, artifacts);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(config.http_addr).await?;
    info!(addr = %config.http_addr, "Lingora Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down...");
        })
        .await?;

    info!("Shutdown complete");
    Ok(())
}
