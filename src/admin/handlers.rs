use axum::{extract::State, Json};
use serde::Serialize;

use crate::command::CommandSnapshot;
use crate::http::server::AppState;
use crate::load_balancer::HealthState;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub commands: usize,
    pub clients: usize,
}

#[derive(Serialize)]
pub struct EndpointStatus {
    pub id: String,
    pub host: String,
    pub port: u16,
    pub weight: u32,
    pub health: HealthState,
    pub healthy: bool,
}

#[derive(Serialize)]
pub struct ClientStatus {
    pub client: String,
    pub service: String,
    pub endpoints: Vec<EndpointStatus>,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        commands: state.executor.registry().snapshots(state.config.as_ref()).len(),
        clients: state.clients.len(),
    })
}

pub async fn get_commands(State(state): State<AppState>) -> Json<Vec<CommandSnapshot>> {
    Json(state.executor.registry().snapshots(state.config.as_ref()))
}

pub async fn get_endpoints(State(state): State<AppState>) -> Json<Vec<ClientStatus>> {
    let statuses = state
        .clients
        .iter()
        .map(|client| {
            let servers = client.servers();
            ClientStatus {
                client: client.name().to_string(),
                service: servers.service().to_string(),
                endpoints: servers
                    .snapshot()
                    .iter()
                    .map(|ep| EndpointStatus {
                        id: ep.id().to_string(),
                        host: ep.host().to_string(),
                        port: ep.port(),
                        weight: ep.weight(),
                        health: ep.health(),
                        healthy: ep.is_healthy(),
                    })
                    .collect(),
            }
        })
        .collect();
    Json(statuses)
}
