//! Directory (service registry) collaborators.
//!
//! # Data Flow
//! ```text
//! ServerListRefresher tick
//!     → Directory::list_endpoints_for(service)
//!         - static_dir.rs (endpoints from config, reloadable)
//!         - http.rs (JSON list fetched from a registry URL)
//!     → ServerList::replace (health kept for surviving endpoints)
//! ```
//!
//! # Design Decisions
//! - Polled, never pushed
//! - The registry protocol is opaque; anything that yields addresses fits

pub mod http;
pub mod static_dir;

use std::sync::Arc;

use futures_util::future::BoxFuture;

pub use http::HttpDirectory;
pub use static_dir::StaticDirectory;

use crate::config::{DirectoryConfig, DirectoryKind};
use crate::load_balancer::EndpointAddr;

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("service {0} is not registered")]
    UnknownService(String),
    #[error("directory request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("directory returned status {0}")]
    Status(u16),
}

/// Source of endpoint lists.
pub trait Directory: Send + Sync {
    fn list_endpoints_for<'a>(
        &'a self,
        service: &'a str,
    ) -> BoxFuture<'a, Result<Vec<EndpointAddr>, DirectoryError>>;
}

/// Build the configured directory.
pub fn from_config(config: &DirectoryConfig) -> Result<Arc<dyn Directory>, DirectoryError> {
    Ok(match config.kind {
        DirectoryKind::Static => Arc::new(StaticDirectory::from_config(config)),
        DirectoryKind::Http => Arc::new(HttpDirectory::new(config)?),
    })
}
