//! stdio transport

use crate::server::PostgresMcpServer;
use anyhow::{Context, Result};
use rmcp::{transport::stdio, ServiceExt};
use std::future::Future;

/// Serve one MCP session over stdin/stdout
///
/// Returns when the client closes stdin or `shutdown` resolves, whichever
/// comes first. Dropping the running service cancels it.
pub async fn serve_stdio(
    server: PostgresMcpServer,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    let service = server
        .serve(stdio())
        .await
        .context("Failed to start stdio transport")?;

    tracing::info!("stdio transport running, waiting for requests...");

    tokio::select! {
        quit = service.waiting() => {
            quit.context("stdio session task failed")?;
            tracing::info!("stdio session ended");
        }
        _ = shutdown => {
            tracing::info!("stdio session interrupted");
        }
    }

    Ok(())
}
