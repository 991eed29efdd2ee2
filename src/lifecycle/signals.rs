//! OS signal handling.
//!
//! SIGINT/SIGTERM trigger graceful shutdown. SIGHUP re-reads the config
//! file and pushes it down the same channel the file watcher uses.

use std::path::PathBuf;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::watcher::reload_into;
use crate::config::EdgeConfig;
use crate::lifecycle::Shutdown;

/// Resolves on Ctrl+C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Ctrl+C received"),
        _ = terminate => tracing::info!("SIGTERM received"),
    }
}

/// Spawn the signal loop: shutdown on SIGINT/SIGTERM, reload on SIGHUP.
pub fn spawn_signal_handler(
    shutdown: Shutdown,
    config_path: Option<PathBuf>,
    reload_tx: mpsc::UnboundedSender<EdgeConfig>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut hangup = match signal(SignalKind::hangup()) {
                Ok(sig) => Some(sig),
                Err(e) => {
                    tracing::warn!(error = %e, "SIGHUP reload unavailable");
                    None
                }
            };

            let stop = shutdown_signal();
            tokio::pin!(stop);
            loop {
                tokio::select! {
                    _ = &mut stop => break,
                    Some(()) = async {
                        match hangup.as_mut() {
                            Some(sig) => sig.recv().await,
                            None => std::future::pending().await,
                        }
                    } => {
                        match config_path.as_deref() {
                            Some(path) => {
                                tracing::info!(path = ?path, "SIGHUP received, reloading configuration");
                                reload_into(path, &reload_tx);
                            }
                            None => tracing::info!("SIGHUP received but no config file in use"),
                        }
                    }
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = (&config_path, &reload_tx);
            shutdown_signal().await;
        }

        shutdown.trigger();
    })
}
