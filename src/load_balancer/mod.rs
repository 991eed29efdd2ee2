//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! LoadBalancedClient::call(request)
//!     → server_list.rs (current snapshot, refreshed from the directory)
//!     → Apply the client's rule:
//!         - round_robin.rs (rotate through healthy endpoints)
//!         - weighted.rs (smooth weighted rotation)
//!     → client.rs Transport (one request to one endpoint)
//!     → Return response or NetworkError
//! ```
//!
//! # Design Decisions
//! - Selection only reads endpoint health; the health monitor writes it
//! - Unhealthy endpoints excluded from selection; Unknown counts as healthy
//! - No retry on another endpoint

pub mod client;
pub mod endpoint;
pub mod round_robin;
pub mod server_list;
pub mod weighted;

use std::sync::Arc;

pub use client::{EdgeRequest, EdgeResponse, HttpTransport, LoadBalancedClient, NetworkError, Transport};
pub use endpoint::{Endpoint, EndpointAddr, HealthState};
pub use round_robin::RoundRobin;
pub use server_list::{ServerList, ServerListRefresher};
pub use weighted::WeightedRoundRobin;

use crate::config::BalancingRule;

/// Endpoint selection strategy.
pub trait LoadBalancer: Send + Sync {
    /// Pick the next endpoint, or `None` when none is healthy.
    fn next_server(&self, endpoints: &[Arc<Endpoint>]) -> Option<Arc<Endpoint>>;
}

pub fn balancer_for(rule: BalancingRule) -> Box<dyn LoadBalancer> {
    match rule {
        BalancingRule::RoundRobin => Box::new(RoundRobin::new()),
        BalancingRule::WeightedRoundRobin => Box::new(WeightedRoundRobin::new()),
    }
}
