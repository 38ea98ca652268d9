//! Graceful shutdown handling
//!
//! OS signals and the `Stop` RPCs all fire the same [`ShutdownSignal`].

use tracing::{info, warn};

use dfs_common::ShutdownSignal;

/// Trigger `shutdown` on Ctrl+C or SIGTERM
pub fn install_signal_handlers(shutdown: &ShutdownSignal) {
    let shutdown = shutdown.clone();

    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    warn!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received Ctrl+C, initiating graceful shutdown...");
            }
            _ = terminate => {
                info!("Received SIGTERM, initiating graceful shutdown...");
            }
            _ = shutdown.wait() => {
                return;
            }
        }

        shutdown.shutdown();
    });
}
