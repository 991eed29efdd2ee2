//! Startup orchestration.
//!
//! # Responsibilities
//! - Build clients, server lists and the command executor from config
//! - Prime server lists before traffic is accepted
//! - Start background tasks (server list refresh, health checks)
//! - Apply reloaded configuration

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::command::{CommandExecutor, CommandRegistry, EmptyKey};
use crate::config::schema::MIDDLETIER_CLIENT;
use crate::config::{DirectoryKind, DynamicConfig, EdgeConfig};
use crate::directory::{self, Directory, DirectoryError, StaticDirectory};
use crate::edge::middletier_keys;
use crate::health::HealthMonitor;
use crate::http::server::{AppState, EdgeServer};
use crate::lifecycle::Shutdown;
use crate::load_balancer::{HttpTransport, LoadBalancedClient, ServerList, ServerListRefresher};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("no client named {0} is configured")]
    MissingClient(String),
    #[error(transparent)]
    Keys(#[from] EmptyKey),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

struct ClientHandle {
    client: Arc<LoadBalancedClient>,
    refresh_interval: Duration,
}

/// Everything the edge process runs, wired together.
pub struct EdgeApp {
    config: Arc<DynamicConfig>,
    directory: Arc<dyn Directory>,
    static_directory: Option<Arc<StaticDirectory>>,
    clients: Vec<ClientHandle>,
    state: AppState,
}

impl EdgeApp {
    /// Build with the directory named in the config.
    pub fn build(config: EdgeConfig) -> Result<Self, StartupError> {
        match config.directory.kind {
            DirectoryKind::Static => {
                let dir = Arc::new(StaticDirectory::from_config(&config.directory));
                let mut app = Self::with_directory(config, dir.clone())?;
                app.static_directory = Some(dir);
                Ok(app)
            }
            DirectoryKind::Http => {
                let dir = directory::from_config(&config.directory)?;
                Self::with_directory(config, dir)
            }
        }
    }

    /// Build against an explicit directory.
    pub fn with_directory(config: EdgeConfig, directory: Arc<dyn Directory>) -> Result<Self, StartupError> {
        let mut names: Vec<&String> = config.clients.keys().collect();
        names.sort();

        let clients: Vec<ClientHandle> = names
            .into_iter()
            .map(|name| {
                let cfg = &config.clients[name];
                let servers = Arc::new(ServerList::new(name.as_str(), cfg.service_name.as_str()));
                let client = LoadBalancedClient::new(
                    name.as_str(),
                    servers,
                    cfg.rule,
                    Arc::new(HttpTransport::from_config(cfg)),
                );
                ClientHandle {
                    client: Arc::new(client),
                    refresh_interval: Duration::from_secs(cfg.refresh_interval_secs),
                }
            })
            .collect();

        let middletier = clients
            .iter()
            .find(|h| h.client.name() == MIDDLETIER_CLIENT)
            .map(|h| Arc::clone(&h.client))
            .ok_or_else(|| StartupError::MissingClient(MIDDLETIER_CLIENT.to_string()))?;

        let config = Arc::new(DynamicConfig::new(config));
        let executor = CommandExecutor::new(Arc::new(CommandRegistry::new()), config.clone());
        let state = AppState {
            executor,
            config: config.clone(),
            middletier_keys: middletier_keys()?,
            middletier,
            clients: Arc::new(clients.iter().map(|h| Arc::clone(&h.client)).collect()),
        };

        Ok(Self {
            config,
            directory,
            static_directory: None,
            clients,
            state,
        })
    }

    pub fn config(&self) -> &Arc<DynamicConfig> {
        &self.config
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn server(&self) -> EdgeServer {
        let timeout = Duration::from_secs(self.config.snapshot().listener.request_timeout_secs);
        EdgeServer::new(self.state.clone(), timeout)
    }

    /// One refresh of every server list. Failures are logged, not fatal.
    pub async fn prime(&self) {
        for handle in &self.clients {
            let refresher = self.refresher(handle);
            match refresher.refresh_once().await {
                Ok(size) => tracing::info!(client = %handle.client.name(), size, "Server list loaded"),
                Err(e) => tracing::warn!(
                    client = %handle.client.name(),
                    error = %e,
                    "Initial server list load failed"
                ),
            }
        }
    }

    /// Start refreshers and the health monitor.
    pub fn spawn_background(&self, shutdown: &Shutdown) -> Vec<JoinHandle<()>> {
        let mut tasks: Vec<JoinHandle<()>> = self
            .clients
            .iter()
            .map(|handle| {
                let refresher = self.refresher(handle);
                tokio::spawn(refresher.run(shutdown.subscribe()))
            })
            .collect();

        let lists = self.clients.iter().map(|h| Arc::clone(h.client.servers())).collect();
        let monitor = HealthMonitor::new(lists, self.config.snapshot().health_check.clone());
        tasks.push(tokio::spawn(monitor.run(shutdown.subscribe())));
        tasks
    }

    /// Install a validated config. Per-call settings apply immediately;
    /// static directory entries apply on the next refresh tick.
    pub fn apply_reload(&self, config: EdgeConfig) {
        if let Some(dir) = &self.static_directory {
            dir.update(&config.directory);
        }
        self.config.store(config);
    }

    fn refresher(&self, handle: &ClientHandle) -> ServerListRefresher {
        ServerListRefresher::new(
            Arc::clone(handle.client.servers()),
            Arc::clone(&self.directory),
            handle.refresh_interval,
        )
    }
}
