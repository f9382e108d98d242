//! Tictactoe server binary.

#![warn(missing_docs)]

mod cli;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use cli::Cli;
use tictactoe_server::{AppState, FileStore, GameService, router};
use tokio::net::TcpListener;
use tracing::{info, instrument, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let config = Cli::parse().into_config()?;

    let default_filter = if *config.debug() {
        "info,tictactoe_server=debug,tictactoe_game=debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    info!(?config, "Starting tictactoe server");

    let store = FileStore::open(config.storage_path())?;
    let service = GameService::new(Arc::new(store));
    let app = router(AppState::new(service.clone(), config.public_base_url()));

    let grace = config.shutdown_grace();

    match config.rustls_config().await? {
        Some(tls) => {
            let addr = tokio::net::lookup_host(config.addr())
                .await?
                .next()
                .with_context(|| format!("address {} resolves to nothing", config.addr()))?;
            let handle = axum_server::Handle::new();
            tokio::spawn(shutdown_on_signal(handle.clone(), grace));

            info!(%addr, "Listening with TLS");
            axum_server::bind_rustls(addr, tls)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        }
        None => {
            let listener = TcpListener::bind(config.addr()).await?;
            info!(addr = %listener.local_addr()?, "Listening");

            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
        }
    }

    info!("HTTP server stopped, draining storage");
    tokio::task::spawn_blocking(move || service.shutdown(grace)).await??;

    info!("Shutdown complete");
    Ok(())
}

/// Stops the TLS server on SIGINT or SIGTERM, giving connections `grace`
/// to finish.
async fn shutdown_on_signal(handle: axum_server::Handle, grace: Duration) {
    shutdown_signal().await;
    handle.graceful_shutdown(Some(grace));
}

/// Resolves on SIGINT or SIGTERM.
#[instrument]
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Can't listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Can't listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C"),
        () = terminate => info!("Received SIGTERM"),
    }
}
