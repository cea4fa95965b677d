//! Wires storage, session and listener together.

use std::sync::Arc;

use courier_server::{ServerConfig, ServerSession, Storage, TransferServer};

use crate::config::Config;

/// Runs the server until Ctrl-C.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let storage = Storage::new(&config.storage_root);
    storage.ensure_root().await?;

    let server = TransferServer::new(ServerConfig {
        bind_addr: config.bind_addr,
        port: config.port,
    });
    server.publish(&config.service_name, Arc::new(ServerSession::new(storage)))?;

    let listener = server.bind().await?;
    let port = server.port().await;
    println!(
        "Server ready: {} published on port {port}, storing files in {}",
        config.service_name, config.storage_root
    );

    let server_run = Arc::clone(&server);
    let mut serve = tokio::spawn(async move { server_run.serve(listener).await });

    tokio::select! {
        result = &mut serve => {
            result??;
            return Ok(());
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("SIGINT received, shutting down");
        }
    }

    server.shutdown();
    serve.await??;
    Ok(())
}
