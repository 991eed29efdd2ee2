//! Server lists and their periodic refresh.
//!
//! A `ServerList` holds an immutable snapshot of endpoints behind an
//! `ArcSwap`; selection works on whatever snapshot it loaded. The refresher
//! polls the directory on a fixed interval and swaps in a merged snapshot.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::broadcast;
use tokio::time;

use crate::directory::{Directory, DirectoryError};
use crate::load_balancer::{Endpoint, EndpointAddr};
use crate::observability::metrics;

#[derive(Debug)]
pub struct ServerList {
    client: String,
    service: String,
    endpoints: ArcSwap<Vec<Arc<Endpoint>>>,
}

impl ServerList {
    pub fn new(client: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            client: client.into(),
            service: service.into(),
            endpoints: ArcSwap::from_pointee(Vec::new()),
        }
    }

    pub fn client(&self) -> &str {
        &self.client
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn snapshot(&self) -> Arc<Vec<Arc<Endpoint>>> {
        self.endpoints.load_full()
    }

    /// Install `addrs` as the new list. Endpoints already present (same
    /// `host:port` and weight) are carried over with their health state.
    pub fn replace(&self, addrs: Vec<EndpointAddr>) -> usize {
        let current = self.endpoints.load();
        let existing: HashMap<&str, &Arc<Endpoint>> =
            current.iter().map(|ep| (ep.id(), ep)).collect();

        let next: Vec<Arc<Endpoint>> = addrs
            .into_iter()
            .map(|addr| match existing.get(addr.id().as_str()) {
                Some(ep) if ep.addr() == &addr => Arc::clone(ep),
                _ => Arc::new(Endpoint::new(addr)),
            })
            .collect();

        let size = next.len();
        self.endpoints.store(Arc::new(next));
        metrics::record_server_list_size(&self.client, size);
        size
    }
}

/// Periodically reloads one server list from the directory.
pub struct ServerListRefresher {
    list: Arc<ServerList>,
    directory: Arc<dyn Directory>,
    interval: Duration,
}

impl ServerListRefresher {
    pub fn new(list: Arc<ServerList>, directory: Arc<dyn Directory>, interval: Duration) -> Self {
        Self {
            list,
            directory,
            interval,
        }
    }

    /// One poll. On failure the current list is left untouched.
    pub async fn refresh_once(&self) -> Result<usize, DirectoryError> {
        let addrs = self.directory.list_endpoints_for(self.list.service()).await?;
        if addrs.is_empty() {
            tracing::warn!(
                client = %self.list.client(),
                service = %self.list.service(),
                "Directory returned no endpoints"
            );
        }
        Ok(self.list.replace(addrs))
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            client = %self.list.client(),
            service = %self.list.service(),
            interval_secs = self.interval.as_secs(),
            "Server list refresher starting"
        );

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.refresh_once().await {
                        Ok(size) => tracing::debug!(client = %self.list.client(), size, "Server list refreshed"),
                        Err(e) => tracing::warn!(
                            client = %self.list.client(),
                            error = %e,
                            "Server list refresh failed, keeping last known list"
                        ),
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!(client = %self.list.client(), "Server list refresher shutting down");
                    break;
                }
            }
        }
    }
}
