//! HTTP upload-and-convert surface (`server` feature).
//!
//! Startup order:
//! 1. Create the output directory.
//! 2. Build the router around a shared [`crate::codec::CodecRuntime`].
//! 3. Serve with graceful shutdown on SIGINT / SIGTERM.
//!
//! The caller owns the runtime and releases it after [`serve`] returns.

pub mod error;
pub mod routes;
pub mod state;

pub use error::ServerError;
pub use state::AppState;

use crate::codec::CodecRuntime;
use crate::config::ServerConfig;
use std::sync::Arc;
use tracing::{info, warn};

/// Run the server until a shutdown signal arrives.
pub async fn serve(config: ServerConfig, runtime: Arc<CodecRuntime>) -> std::io::Result<()> {
    tokio::fs::create_dir_all(&config.output_dir).await?;

    let addr = config.bind_address();
    info!(
        output_dir = %config.output_dir.display(),
        max_upload_mb = config.max_upload_mb,
        max_conversions = config.max_concurrent_conversions,
        pdf_engine = runtime.has_pdf_engine(),
        "morphos server starting"
    );

    let app = routes::build(AppState::new(config, runtime));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("morphos server stopped");
    Ok(())
}

/// Resolves when SIGINT (Ctrl-C) or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install CTRL+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received; starting graceful shutdown");
}
