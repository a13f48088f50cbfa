//! Startup and orderly shutdown

use crate::config::Settings;
use crate::db::{Database, PgDatabase};
use crate::server::PostgresMcpServer;
use crate::transport::{serve_stdio, HttpTransport};
use anyhow::Result;
use std::sync::Arc;

/// Connect, serve every enabled transport, and shut down in order
///
/// The stdio session (or Ctrl-C when stdio is disabled) decides the
/// lifetime. The HTTP transport is stopped next and the database pool is
/// closed last, exactly once.
pub async fn run(settings: Settings) -> Result<()> {
    let db = Arc::new(PgDatabase::connect(&settings.database).await?);
    tracing::info!(schema = db.schema(), "Connected to PostgreSQL");

    let outcome = serve(&settings, Arc::clone(&db) as Arc<dyn Database>).await;

    db.close().await;
    tracing::info!("Database pool closed");

    outcome
}

async fn serve(settings: &Settings, db: Arc<dyn Database>) -> Result<()> {
    let server = PostgresMcpServer::setup(db, &settings.resource_base).await?;

    let http = match &settings.http {
        Some(http) => Some(HttpTransport::bind(http, server.clone()).await?),
        None => None,
    };

    let outcome = if settings.stdio {
        serve_stdio(server, shutdown_signal()).await
    } else {
        shutdown_signal().await;
        Ok(())
    };

    if let Some(http) = http {
        http.shutdown().await;
    }

    outcome
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl-C, shutting down"),
        Err(e) => {
            tracing::warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
