//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router for the edge and admin surfaces
//! - Wire up middleware (tracing, timeout, request ID)
//! - Bind to a listener and serve until shutdown

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::admin;
use crate::command::{CommandExecutor, CommandKeys};
use crate::config::DynamicConfig;
use crate::edge::MiddleTierCommand;
use crate::http::request::{propagate_request_id_layer, request_id, set_request_id_layer};
use crate::load_balancer::LoadBalancedClient;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub executor: CommandExecutor,
    pub config: Arc<DynamicConfig>,
    pub middletier_keys: CommandKeys,
    pub middletier: Arc<LoadBalancedClient>,
    /// Every load-balanced client, for the admin endpoint view.
    pub clients: Arc<Vec<Arc<LoadBalancedClient>>>,
}

/// HTTP server for the edge service.
pub struct EdgeServer {
    router: Router,
}

impl EdgeServer {
    pub fn new(state: AppState, request_timeout: Duration) -> Self {
        Self {
            router: Self::build_router(state, request_timeout),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: AppState, request_timeout: Duration) -> Router {
        let trace = TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
            tracing::info_span!(
                "request",
                method = %req.method(),
                path = %req.uri().path(),
                request_id = request_id(req).unwrap_or("-"),
            )
        });

        Router::new()
            .route("/service/edge/v1/middletier", get(middletier_handler))
            .route("/healthcheck", get(healthcheck_handler))
            .with_state(state.clone())
            .merge(admin::setup_admin_router(state))
            .layer(TimeoutLayer::new(request_timeout))
            .layer(propagate_request_id_layer())
            .layer(trace)
            .layer(set_request_id_layer())
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until the shutdown broadcast fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn middletier_handler(State(state): State<AppState>) -> impl IntoResponse {
    let command = Arc::new(MiddleTierCommand::new(
        state.middletier_keys.clone(),
        Arc::clone(&state.middletier),
    ));
    match state.executor.execute(command).await {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => {
            tracing::error!(error = %e, "Middle tier call failed without fallback");
            (StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
    }
}

async fn healthcheck_handler() -> &'static str {
    "OK"
}
