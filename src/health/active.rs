//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe every endpoint in the monitored server lists
//! - Update endpoint health state based on results

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::time;

use crate::config::HealthCheckConfig;
use crate::load_balancer::{Endpoint, ServerList};
use crate::observability::metrics;

pub struct HealthMonitor {
    lists: Vec<Arc<ServerList>>,
    config: HealthCheckConfig,
    client: Client<HttpConnector, Body>,
}

impl HealthMonitor {
    pub fn new(lists: Vec<Arc<ServerList>>, config: HealthCheckConfig) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Self {
            lists,
            config,
            client,
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Active health checks disabled");
            return;
        }

        tracing::info!(
            interval = self.config.interval_secs,
            path = self.config.path.as_deref().unwrap_or("<tcp>"),
            "Health monitor starting"
        );

        let mut ticker = time::interval(Duration::from_secs(self.config.interval_secs));
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_all().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Probe every endpoint once.
    pub async fn check_all(&self) {
        for list in &self.lists {
            let snapshot = list.snapshot();
            for endpoint in snapshot.iter() {
                let passed = self.probe(endpoint).await;
                let was_healthy = endpoint.is_healthy();

                if passed {
                    endpoint.mark_success(self.config.healthy_threshold as usize);
                } else {
                    endpoint.mark_failure(self.config.unhealthy_threshold as usize);
                }

                let healthy = endpoint.is_healthy();
                if healthy != was_healthy {
                    tracing::info!(
                        client = %list.client(),
                        endpoint = %endpoint,
                        healthy,
                        "Endpoint health changed"
                    );
                }
                metrics::record_endpoint_health(list.client(), endpoint.id(), healthy);
            }
        }
    }

    async fn probe(&self, endpoint: &Endpoint) -> bool {
        let timeout = Duration::from_millis(self.config.timeout_ms);
        match self.config.path.as_deref() {
            Some(path) => self.probe_http(endpoint, path, timeout).await,
            None => match time::timeout(timeout, TcpStream::connect((endpoint.host(), endpoint.port()))).await {
                Ok(Ok(_)) => true,
                Ok(Err(e)) => {
                    tracing::warn!(endpoint = %endpoint, error = %e, "Health check failed: connect error");
                    false
                }
                Err(_) => {
                    tracing::warn!(endpoint = %endpoint, "Health check failed: timeout");
                    false
                }
            },
        }
    }

    async fn probe_http(&self, endpoint: &Endpoint, path: &str, timeout: Duration) -> bool {
        let request = match Request::builder()
            .method("GET")
            .uri(endpoint.url_for(path))
            .header("user-agent", "flux-edge-health-check")
            .body(Body::empty())
        {
            Ok(req) => req,
            Err(e) => {
                tracing::error!(endpoint = %endpoint, error = %e, "Failed to build health check request");
                return false;
            }
        };

        match time::timeout(timeout, self.client.request(request)).await {
            Ok(Ok(response)) => {
                let success = response.status().is_success();
                if !success {
                    tracing::warn!(endpoint = %endpoint, status = %response.status(), "Health check failed: non-success status");
                }
                success
            }
            Ok(Err(e)) => {
                tracing::warn!(endpoint = %endpoint, error = %e, "Health check failed: connection error");
                false
            }
            Err(_) => {
                tracing::warn!(endpoint = %endpoint, "Health check failed: timeout");
                false
            }
        }
    }
}
