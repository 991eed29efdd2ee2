//! Load-balanced client: one endpoint pick, one network call.
//!
//! No retry across endpoints and no feedback into endpoint health; failures
//! surface to the command that made the call.

use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Method, Request, StatusCode};
use futures_util::future::{BoxFuture, FutureExt};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;

use crate::config::{BalancingRule, ClientConfig};
use crate::load_balancer::{balancer_for, Endpoint, LoadBalancer, ServerList};

/// Upper bound on a buffered response body.
const MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("no available endpoints for client {0}")]
    NoAvailableEndpoints(String),
    #[error("connect to {endpoint} failed: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("{endpoint} did not respond within {after:?}")]
    Timeout { endpoint: String, after: Duration },
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("transport error talking to {endpoint}: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Outbound request, relative to whichever endpoint is picked.
#[derive(Debug, Clone)]
pub struct EdgeRequest {
    pub method: Method,
    pub path_and_query: String,
    pub headers: HeaderMap,
}

impl EdgeRequest {
    pub fn get(path_and_query: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path_and_query: path_and_query.into(),
            headers: HeaderMap::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EdgeResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// `host:port` that served the response.
    pub endpoint: String,
}

/// Carries one request to one endpoint.
pub trait Transport: Send + Sync {
    fn send<'a>(
        &'a self,
        endpoint: &'a Endpoint,
        request: &'a EdgeRequest,
    ) -> BoxFuture<'a, Result<EdgeResponse, NetworkError>>;
}

/// HTTP/1.1 transport on the hyper-util pooled client.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client<HttpConnector, Body>,
    read_timeout: Duration,
}

impl HttpTransport {
    pub fn new(connect_timeout: Duration, read_timeout: Duration) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(connect_timeout));
        connector.set_nodelay(true);
        let client = Client::builder(TokioExecutor::new()).build(connector);
        Self {
            client,
            read_timeout,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(
            Duration::from_millis(config.connect_timeout_ms),
            Duration::from_millis(config.read_timeout_ms),
        )
    }

    async fn exchange(
        &self,
        endpoint: &Endpoint,
        request: &EdgeRequest,
    ) -> Result<EdgeResponse, NetworkError> {
        let mut builder = Request::builder()
            .method(request.method.clone())
            .uri(endpoint.url_for(&request.path_and_query))
            .header("user-agent", "flux-edge");
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        let req = builder
            .body(Body::empty())
            .map_err(|e| NetworkError::InvalidRequest(e.to_string()))?;

        let res = self.client.request(req).await.map_err(|e| {
            if e.is_connect() {
                NetworkError::Connect {
                    endpoint: endpoint.id().to_string(),
                    source: Box::new(e),
                }
            } else {
                NetworkError::Transport {
                    endpoint: endpoint.id().to_string(),
                    source: Box::new(e),
                }
            }
        })?;

        let (parts, incoming): (_, hyper::body::Incoming) = res.into_parts();
        let body = axum::body::to_bytes(Body::new(incoming), MAX_BODY_BYTES)
            .await
            .map_err(|e| NetworkError::Transport {
                endpoint: endpoint.id().to_string(),
                source: Box::new(e),
            })?;

        Ok(EdgeResponse {
            status: parts.status,
            headers: parts.headers,
            body,
            endpoint: endpoint.id().to_string(),
        })
    }
}

impl Transport for HttpTransport {
    fn send<'a>(
        &'a self,
        endpoint: &'a Endpoint,
        request: &'a EdgeRequest,
    ) -> BoxFuture<'a, Result<EdgeResponse, NetworkError>> {
        async move {
            tokio::time::timeout(self.read_timeout, self.exchange(endpoint, request))
                .await
                .map_err(|_| NetworkError::Timeout {
                    endpoint: endpoint.id().to_string(),
                    after: self.read_timeout,
                })?
        }
        .boxed()
    }
}

/// Named client over one server list.
pub struct LoadBalancedClient {
    name: String,
    servers: Arc<ServerList>,
    balancer: Box<dyn LoadBalancer>,
    transport: Arc<dyn Transport>,
}

impl LoadBalancedClient {
    pub fn new(
        name: impl Into<String>,
        servers: Arc<ServerList>,
        rule: BalancingRule,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            name: name.into(),
            servers,
            balancer: balancer_for(rule),
            transport,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn servers(&self) -> &Arc<ServerList> {
        &self.servers
    }

    /// Pick a healthy endpoint and issue `request` to it.
    pub async fn call(&self, request: EdgeRequest) -> Result<EdgeResponse, NetworkError> {
        let snapshot = self.servers.snapshot();
        let endpoint = self
            .balancer
            .next_server(&snapshot)
            .ok_or_else(|| NetworkError::NoAvailableEndpoints(self.name.clone()))?;

        tracing::trace!(client = %self.name, endpoint = %endpoint, path = %request.path_and_query, "Dispatching");
        self.transport.send(&endpoint, &request).await
    }
}
