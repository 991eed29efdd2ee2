//! flux-edge
//!
//! Edge service fronting the middle tier. Calls go through a command
//! executor that isolates them per pool, bounds them with a timeout, trips a
//! per-command circuit breaker on sustained errors and serves a fallback
//! whenever the middle tier cannot answer.
//!
//! ```text
//!     Client ──▶ http server ──▶ command executor ──▶ load-balanced client ──▶ middle tier
//!                    │                 │                      ▲
//!                    │          breaker + pool           server list ◀── directory (polled)
//!                    │                 │                      ▲
//!                    └── admin ◀── registry/metrics     health monitor
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use flux_edge::config::watcher::ConfigWatcher;
use flux_edge::config::{load_config, EdgeConfig};
use flux_edge::lifecycle::{signals, EdgeApp, Shutdown};
use flux_edge::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "flux-edge", version, about = "Resilient edge service for the middle tier")]
struct Args {
    /// Path to the TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => EdgeConfig::default(),
    };

    logging::init(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "flux-edge starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        clients = config.clients.len(),
        directory = ?config.directory.kind,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let bind_address = config.listener.bind_address.clone();
    let app = Arc::new(EdgeApp::build(config)?);
    app.prime().await;

    let shutdown = Shutdown::new();
    let background = app.spawn_background(&shutdown);

    // Reloads from the file watcher and SIGHUP share one channel.
    let (reload_tx, mut reload_rx, _watcher) = match &args.config {
        Some(path) => {
            let (watcher, rx) = ConfigWatcher::new(path);
            let tx = watcher.sender();
            let handle = match watcher.run() {
                Ok(w) => Some(w),
                Err(e) => {
                    tracing::warn!(error = %e, "Config watcher unavailable, SIGHUP reload only");
                    None
                }
            };
            (tx, rx, handle)
        }
        None => {
            let (tx, rx) = mpsc::unbounded_channel();
            (tx, rx, None)
        }
    };

    let reloader = {
        let app = Arc::clone(&app);
        tokio::spawn(async move {
            while let Some(new_config) = reload_rx.recv().await {
                app.apply_reload(new_config);
            }
        })
    };

    signals::spawn_signal_handler(shutdown.clone(), args.config.clone(), reload_tx);

    let listener = TcpListener::bind(&bind_address).await?;
    app.server().run(listener, shutdown.subscribe()).await?;

    for task in background {
        let _ = task.await;
    }
    reloader.abort();

    tracing::info!("Shutdown complete");
    Ok(())
}
