//! Directory backed by the `[directory.services]` config table.

use std::collections::HashMap;

use arc_swap::ArcSwap;
use futures_util::future::{self, BoxFuture, FutureExt};

use crate::config::DirectoryConfig;
use crate::directory::{Directory, DirectoryError};
use crate::load_balancer::EndpointAddr;

type Services = HashMap<String, Vec<EndpointAddr>>;

#[derive(Debug)]
pub struct StaticDirectory {
    services: ArcSwap<Services>,
}

impl StaticDirectory {
    pub fn new(services: Services) -> Self {
        Self {
            services: ArcSwap::from_pointee(services),
        }
    }

    pub fn from_config(config: &DirectoryConfig) -> Self {
        Self::new(Self::collect(config))
    }

    /// Swap in the services of a reloaded config. Refreshers pick them up on
    /// their next tick.
    pub fn update(&self, config: &DirectoryConfig) {
        self.services.store(std::sync::Arc::new(Self::collect(config)));
    }

    fn collect(config: &DirectoryConfig) -> Services {
        config
            .services
            .iter()
            .map(|(name, eps)| (name.clone(), eps.iter().map(EndpointAddr::from).collect()))
            .collect()
    }
}

impl Directory for StaticDirectory {
    fn list_endpoints_for<'a>(
        &'a self,
        service: &'a str,
    ) -> BoxFuture<'a, Result<Vec<EndpointAddr>, DirectoryError>> {
        let result = self
            .services
            .load()
            .get(service)
            .cloned()
            .ok_or_else(|| DirectoryError::UnknownService(service.to_string()));
        future::ready(result).boxed()
    }
}
